#![deny(warnings)]

//! Core domain models and invariants for the car lot simulation.
//!
//! This crate defines the serializable records shared by the generator, the
//! buyer AI and the runtime, plus validation helpers for the invariants the
//! rest of the engine relies on. Field names serialize in camelCase, one JSON
//! document per save key.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lowest value any car can be worth, in whole dollars.
pub const VALUE_FLOOR: i64 = 300;

/// Lowest upper clamp for a car's base value, in whole dollars.
pub const BASE_CEILING_FLOOR: i64 = 1000;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

id_type!(
    /// Identifier of a generated car, stable across market, inventory and listing.
    CarId
);
id_type!(
    /// Identifier of a listing.
    ListingId
);
id_type!(
    /// Identifier of a simulated buyer.
    BuyerId
);
id_type!(
    /// Identifier of a persisted wave schedule entry.
    WaveId
);
id_type!(
    /// Identifier of a workshop repair job.
    JobId
);

/// Milliseconds since the Unix epoch.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Timestamp `ms` milliseconds later.
    pub fn plus(self, ms: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(i64::try_from(ms).unwrap_or(i64::MAX)))
    }

    /// Milliseconds from `self` until `later`, zero if `later` is not after `self`.
    pub fn millis_until(self, later: Timestamp) -> u64 {
        u64::try_from(later.0.saturating_sub(self.0)).unwrap_or(0)
    }
}

/// Round a floating amount to whole dollars (half away from zero).
pub fn dollars(value: f64) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_f64(value.round()).unwrap_or(Decimal::ZERO)
}

/// Lossy view of a money amount for probability and ratio math.
pub fn as_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Static reference entry describing a make/model and its typical market value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTemplate {
    pub make: String,
    pub model: String,
    /// Typical market value in dollars. Accepts the snake_case key used by older data files.
    #[serde(alias = "common_market")]
    pub common_market: f64,
}

impl ModelTemplate {
    /// Market anchor used by the generator; non-positive values are coerced to 1.
    pub fn market_anchor(&self) -> f64 {
        if self.common_market.is_finite() && self.common_market >= 1.0 {
            self.common_market
        } else {
            1.0
        }
    }

    /// Upper clamp for the base value of cars generated from this template.
    pub fn base_ceiling(&self) -> f64 {
        (BASE_CEILING_FLOOR as f64).max(self.market_anchor() * 1.4)
    }
}

/// Kind of hidden damage a car can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageKind {
    Body,
    Mechanical,
}

/// A single damage entry with its repair cost.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Damage {
    #[serde(rename = "type")]
    pub kind: DamageKind,
    pub cost: Decimal,
}

/// Where a car currently sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarStatus {
    Market,
    Owned,
}

/// A concrete car instance, generated from a [`ModelTemplate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub id: CarId,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub mileage: u32,
    /// Condition stars in [1,5].
    pub condition: u8,
    /// Fair value before seller markup.
    pub base: Decimal,
    /// Seller's asking price.
    pub asking: Decimal,
    /// Seller's private floor.
    pub reserve: Decimal,
    pub estimated_resale: Decimal,
    #[serde(default)]
    pub damages: Vec<Damage>,
    #[serde(default)]
    pub estimated_repair_cost: Decimal,
    #[serde(default)]
    pub inspected: bool,
    pub status: CarStatus,
    /// Set once the player owns the car.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<Decimal>,
    #[serde(default)]
    pub repair_spent: Decimal,
}

impl Car {
    /// Sum of all damage costs.
    pub fn total_damage_cost(&self) -> Decimal {
        self.damages.iter().map(|d| d.cost).sum()
    }

    /// Purchase price plus repair spend.
    pub fn total_spent(&self) -> Decimal {
        self.purchase_price.unwrap_or(Decimal::ZERO) + self.repair_spent
    }

    /// Value buyers anchor to: estimated resale, or base when resale is unknown.
    pub fn valuation_anchor(&self) -> Decimal {
        if self.estimated_resale > Decimal::ZERO {
            self.estimated_resale
        } else {
            self.base
        }
    }

    pub fn title(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }
}

/// Buyer archetype controlling budget and offer aggressiveness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Bargain,
    Realist,
    Impulse,
    Collector,
}

impl Persona {
    pub const ALL: [Persona; 4] = [
        Persona::Bargain,
        Persona::Realist,
        Persona::Impulse,
        Persona::Collector,
    ];
}

/// A simulated buyer attached to one listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buyer {
    pub id: BuyerId,
    /// Hard maximum the buyer will pay.
    pub budget: Decimal,
    /// Current standing offer.
    pub offer: Decimal,
    /// Remaining negotiation rounds.
    pub patience: u32,
    /// Cosmetic interest score in [0,1).
    #[serde(default)]
    pub interest: f64,
    pub persona: Persona,
}

/// A pending buyer wave persisted with its absolute due time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledWave {
    pub id: WaveId,
    pub due_at: Timestamp,
    pub size: u32,
}

/// A car offered for sale by the player.
///
/// The listed car is flattened into the record, mirroring the saved shape where
/// listing fields sit next to the car fields. The listing's own id is stored
/// under `listingId` so it does not collide with the car id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    #[serde(rename = "listingId")]
    pub id: ListingId,
    #[serde(flatten)]
    pub car: Car,
    pub list_price: Decimal,
    pub created_at: Timestamp,
    #[serde(default)]
    pub waves: u32,
    #[serde(default)]
    pub buyers: Vec<Buyer>,
    #[serde(default)]
    pub wave_schedule: Vec<ScheduledWave>,
}

impl Listing {
    /// Attractiveness ratio: list price over `max(1, resale || base)`.
    pub fn price_ratio(&self) -> f64 {
        let anchor = as_f64(self.car.valuation_anchor()).max(1.0);
        as_f64(self.list_price) / anchor
    }

    pub fn buyer(&self, id: &BuyerId) -> Option<&Buyer> {
        self.buyers.iter().find(|b| &b.id == id)
    }

    pub fn buyer_mut(&mut self, id: &BuyerId) -> Option<&mut Buyer> {
        self.buyers.iter_mut().find(|b| &b.id == id)
    }
}

/// Lifecycle of a workshop job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairStatus {
    Queued,
    InProgress,
    Done,
    Cancelled,
}

impl RepairStatus {
    /// Queued or in progress.
    pub fn is_pending(self) -> bool {
        matches!(self, RepairStatus::Queued | RepairStatus::InProgress)
    }
}

/// A repair job occupying the single workshop bay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairJob {
    pub id: JobId,
    pub car_id: CarId,
    pub cost: Decimal,
    pub status: RepairStatus,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<Timestamp>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl RepairJob {
    /// When an in-progress job finishes.
    pub fn finishes_at(&self) -> Option<Timestamp> {
        self.start_at.map(|s| s.plus(self.duration_ms))
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Condition outside [1,5].
    #[error("condition {0} is out of range [1,5]")]
    ConditionOutOfRange(u8),
    /// Base value outside [300, max(1000, common_market*1.4)].
    #[error("base value {0} is out of range")]
    BaseOutOfRange(Decimal),
    /// Estimated resale below the value floor.
    #[error("estimated resale {0} is below the floor")]
    ResaleBelowFloor(Decimal),
    /// Damage entries must cost something.
    #[error("damage cost must be > 0")]
    NonPositiveDamage,
    /// Price or cost must be non-negative.
    #[error("negative monetary value is invalid")]
    NegativeMoney,
    /// Template names must be non-empty.
    #[error("template make/model must not be empty")]
    EmptyName,
}

/// Validate a model template.
pub fn validate_template(t: &ModelTemplate) -> Result<(), ValidationError> {
    if t.make.trim().is_empty() || t.model.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(())
}

/// Validate a generated car against the template it came from.
pub fn validate_car(car: &Car, template: &ModelTemplate) -> Result<(), ValidationError> {
    if !(1..=5).contains(&car.condition) {
        return Err(ValidationError::ConditionOutOfRange(car.condition));
    }
    let floor = Decimal::from(VALUE_FLOOR);
    let ceiling = dollars(template.base_ceiling().ceil());
    if car.base < floor || car.base > ceiling {
        return Err(ValidationError::BaseOutOfRange(car.base));
    }
    if car.estimated_resale < floor {
        return Err(ValidationError::ResaleBelowFloor(car.estimated_resale));
    }
    if car.damages.iter().any(|d| d.cost <= Decimal::ZERO) {
        return Err(ValidationError::NonPositiveDamage);
    }
    if car.asking < Decimal::ZERO
        || car.reserve < Decimal::ZERO
        || car.estimated_repair_cost < Decimal::ZERO
        || car.repair_spent < Decimal::ZERO
    {
        return Err(ValidationError::NegativeMoney);
    }
    Ok(())
}
