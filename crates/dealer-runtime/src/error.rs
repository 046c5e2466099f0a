use dealer_ai::NegotiationError;
use dealer_core::CarId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Why an operation on the dealership was rejected. Nothing is mutated when
/// one of these is returned.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("insufficient funds: need ${needed}, have ${available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("on cooldown for another {remaining_ms} ms")]
    CooldownActive { remaining_ms: u64 },
    #[error("no longer exists: {0}")]
    StaleReference(String),
    #[error("car {0} has a pending workshop job")]
    InWorkshop(CarId),
}

impl EngineError {
    pub(crate) fn stale(what: &str, id: impl std::fmt::Display) -> Self {
        EngineError::StaleReference(format!("{what} {id}"))
    }
}

impl From<NegotiationError> for EngineError {
    fn from(e: NegotiationError) -> Self {
        match e {
            NegotiationError::Closed => EngineError::StaleReference("negotiation is over".into()),
            NegotiationError::InvalidPrice => EngineError::InvalidInput(e.to_string()),
        }
    }
}
