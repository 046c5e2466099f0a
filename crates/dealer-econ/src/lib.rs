#![deny(warnings)]

//! Economic models for the car lot: procedural car generation and pricing.
//!
//! This crate provides:
//! - The car generator, turning a model template plus randomness into a car
//! - Deal ratings, listing heat and buyer interest heuristics
//! - Profit, inspection and repair quote helpers
//!
//! Every random draw goes through a caller-supplied [`rand::Rng`], so a seeded
//! generator reproduces the same market.

pub mod generator;
pub mod pricing;

pub use generator::{
    apply_standout_discount, generate_car, generate_damages, GeneratorConfig, SellerArchetype,
};
pub use pricing::{
    buyer_interest, inspection_cost, listing_heat, profit, profit_pct, rate_deal, repair_quote,
    suggested_list_price, DealRating,
};

use rand::Rng;
use thiserror::Error;

/// Errors produced by economic helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Monetary values must be non-negative and finite.
    #[error("invalid price or cost value")]
    InvalidPrice,
    /// Numeric input was NaN or infinite.
    #[error("non-finite numeric value")]
    NonFinite,
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Short random identifier such as `car_k3j9x0a`.
pub fn uid<R: Rng + ?Sized>(prefix: &str, rng: &mut R) -> String {
    let suffix: String = (0..7)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{prefix}_{suffix}")
}
