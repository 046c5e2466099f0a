#![deny(warnings)]

//! Simulated counterparties: buyer personas, buyer waves and negotiation.
//!
//! Everything here is pure and takes its randomness from the caller, so the
//! runtime can drive it with a seeded RNG and tests can pin every branch.

pub mod negotiation;
pub mod personas;
pub mod waves;

pub use negotiation::{Negotiation, NegotiationError, NegotiationSide, Outcome, WalkReason};
pub use personas::{persona_for_roll, profile, spawn_buyer, PersonaProfile};
pub use waves::{plan_follow_up, plan_initial_waves, spawn_wave, PriceBracket, WavePlan};

#[cfg(test)]
pub(crate) mod test_support {
    use dealer_core::{Car, CarId, CarStatus, Listing, ListingId, Timestamp};
    use rust_decimal::Decimal;

    pub fn car() -> Car {
        Car {
            id: CarId::from("car_test"),
            make: "Mazda".to_string(),
            model: "3".to_string(),
            year: 2018,
            mileage: 60_000,
            condition: 4,
            base: Decimal::new(8_000, 0),
            asking: Decimal::new(9_000, 0),
            reserve: Decimal::new(6_500, 0),
            estimated_resale: Decimal::new(10_000, 0),
            damages: vec![],
            estimated_repair_cost: Decimal::ZERO,
            inspected: false,
            status: CarStatus::Owned,
            purchase_price: Some(Decimal::new(8_500, 0)),
            repair_spent: Decimal::ZERO,
        }
    }

    pub fn listing(list_price: Decimal, resale: Decimal) -> Listing {
        let mut car = car();
        car.estimated_resale = resale;
        Listing {
            id: ListingId::from("listing_test"),
            car,
            list_price,
            created_at: Timestamp(0),
            waves: 0,
            buyers: vec![],
            wave_schedule: vec![],
        }
    }
}
