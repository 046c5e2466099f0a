//! Buyer personas and buyer generation.

use dealer_core::{as_f64, dollars, Buyer, BuyerId, Listing, Persona};
use dealer_econ::uid;
use rand::Rng;

/// Behavioural ranges for one persona.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PersonaProfile {
    /// Budget multiplier range over the listing's valuation anchor.
    pub budget: (f64, f64),
    /// Initial offer discount range off the list price.
    pub discount: (f64, f64),
    /// Inclusive patience range in negotiation rounds.
    pub patience: (u32, u32),
    /// Multiplier on the sell-side acceptance probability.
    pub accept_factor: f64,
}

/// Profile for `persona`. Bargain hunters discount deepest, collectors pay up.
pub fn profile(persona: Persona) -> PersonaProfile {
    match persona {
        Persona::Bargain => PersonaProfile {
            budget: (0.80, 1.00),
            discount: (0.25, 0.40),
            patience: (1, 2),
            accept_factor: 0.85,
        },
        Persona::Realist => PersonaProfile {
            budget: (0.90, 1.10),
            discount: (0.15, 0.27),
            patience: (2, 4),
            accept_factor: 1.0,
        },
        Persona::Impulse => PersonaProfile {
            budget: (0.95, 1.20),
            discount: (0.06, 0.18),
            patience: (1, 2),
            accept_factor: 1.15,
        },
        Persona::Collector => PersonaProfile {
            budget: (1.05, 1.30),
            discount: (0.05, 0.20),
            patience: (3, 5),
            accept_factor: 1.2,
        },
    }
}

/// Map a uniform roll in [0,1) onto the persona mix 35/35/25/5.
pub fn persona_for_roll(roll: f64) -> Persona {
    if roll < 0.35 {
        Persona::Bargain
    } else if roll < 0.70 {
        Persona::Realist
    } else if roll < 0.95 {
        Persona::Impulse
    } else {
        Persona::Collector
    }
}

/// Create one buyer interested in `listing`.
pub fn spawn_buyer<R: Rng + ?Sized>(listing: &Listing, rng: &mut R) -> Buyer {
    let persona = persona_for_roll(rng.gen());
    let p = profile(persona);
    let anchor = as_f64(listing.car.valuation_anchor()).max(1.0);
    let budget = dollars(anchor * rng.gen_range(p.budget.0..p.budget.1));
    let discount = rng.gen_range(p.discount.0..p.discount.1);
    let offer = dollars(as_f64(listing.list_price) * (1.0 - discount)).min(budget);
    let patience = rng.gen_range(p.patience.0..=p.patience.1);
    Buyer {
        id: BuyerId(uid("b", rng)),
        budget,
        offer,
        patience,
        interest: rng.gen(),
        persona,
    }
}
