//! Turn-based negotiation between the player and a seller or a buyer.
//!
//! A session ends in exactly one of two terminal states: a deal, or the
//! counterparty walking away. Every rejected counter and every decline costs
//! one point of patience, so a session lasts at most its starting patience
//! in rounds.

use dealer_core::{as_f64, dollars, Buyer, BuyerId, Car, CarId, ListingId, Persona};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::personas::profile;

/// Who the player is negotiating with.
#[derive(Clone, Debug, PartialEq)]
pub enum NegotiationSide {
    /// Player buying a market car from its seller.
    Buy {
        car_id: CarId,
        asking: Decimal,
        /// Seller's private floor. Exposed for hints; acceptance odds key off the reference price.
        reserve: Decimal,
    },
    /// Player selling a listed car to one of its buyers.
    Sell {
        listing_id: ListingId,
        buyer_id: BuyerId,
        budget: Decimal,
        persona: Persona,
    },
}

/// Why a counterparty walked away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WalkReason {
    /// Buy side: the counter was insultingly low.
    Insulted,
    /// Sell side: the counter exceeded the buyer's budget.
    OverBudget,
    /// Patience ran out.
    OutOfPatience,
}

/// Result of one player action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Deal closes at `price`.
    Deal { price: Decimal },
    /// Counterparty left; the session is over.
    Walked { reason: WalkReason },
    /// Counterparty answered with a new price; negotiation continues.
    Countered { price: Decimal },
    /// Player declined; negotiation continues with less patience.
    Declined,
}

#[derive(Debug, Error, PartialEq)]
pub enum NegotiationError {
    #[error("negotiation is already over")]
    Closed,
    #[error("price must be > 0")]
    InvalidPrice,
}

/// State of one negotiation session.
#[derive(Clone, Debug, PartialEq)]
pub struct Negotiation {
    side: NegotiationSide,
    round: u32,
    patience: u32,
    initial_patience: u32,
    /// Seller's standing counter (buy) or the buyer's current offer (sell).
    last_counter: Option<Decimal>,
    walked: bool,
    closed: bool,
}

impl Negotiation {
    /// Open a buy-side session against a market car's seller.
    pub fn buy<R: Rng + ?Sized>(car: &Car, rng: &mut R) -> Self {
        let patience = rng.gen_range(3..=5);
        Self::new(
            NegotiationSide::Buy {
                car_id: car.id.clone(),
                asking: car.asking,
                reserve: car.reserve,
            },
            patience,
            None,
        )
    }

    /// Open a sell-side session against a listing's buyer. The buyer's stored
    /// offer and patience seed the session.
    pub fn sell(listing_id: &ListingId, buyer: &Buyer) -> Self {
        Self::new(
            NegotiationSide::Sell {
                listing_id: listing_id.clone(),
                buyer_id: buyer.id.clone(),
                budget: buyer.budget,
                persona: buyer.persona,
            },
            buyer.patience.max(1),
            Some(buyer.offer),
        )
    }

    fn new(side: NegotiationSide, patience: u32, last_counter: Option<Decimal>) -> Self {
        Self {
            side,
            round: 1,
            patience,
            initial_patience: patience,
            last_counter,
            walked: false,
            closed: false,
        }
    }

    pub fn side(&self) -> &NegotiationSide {
        &self.side
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn patience(&self) -> u32 {
        self.patience
    }

    pub fn initial_patience(&self) -> u32 {
        self.initial_patience
    }

    pub fn walked(&self) -> bool {
        self.walked
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Remaining patience as a fraction of the starting patience.
    pub fn patience_fraction(&self) -> f64 {
        if self.initial_patience == 0 {
            return 0.0;
        }
        f64::from(self.patience) / f64::from(self.initial_patience)
    }

    /// Price on the table: the seller's counter or asking price when buying,
    /// the buyer's current offer when selling.
    pub fn reference_price(&self) -> Decimal {
        match &self.side {
            NegotiationSide::Buy { asking, .. } => self.last_counter.unwrap_or(*asking),
            NegotiationSide::Sell { .. } => self.last_counter.unwrap_or(Decimal::ZERO),
        }
    }

    /// Take the price on the table.
    pub fn accept(&mut self) -> Result<Outcome, NegotiationError> {
        self.ensure_open()?;
        let price = self.reference_price();
        if price <= Decimal::ZERO {
            return Err(NegotiationError::InvalidPrice);
        }
        self.closed = true;
        Ok(Outcome::Deal { price })
    }

    /// Walk past the current counter without proposing a price.
    pub fn decline(&mut self) -> Result<Outcome, NegotiationError> {
        self.ensure_open()?;
        if matches!(self.side, NegotiationSide::Buy { .. }) {
            self.last_counter = None;
        }
        Ok(self.spend_patience().unwrap_or(Outcome::Declined))
    }

    /// Propose `price`. A single draw from `rng` decides acceptance.
    pub fn counter<R: Rng + ?Sized>(
        &mut self,
        price: Decimal,
        rng: &mut R,
    ) -> Result<Outcome, NegotiationError> {
        self.ensure_open()?;
        if price <= Decimal::ZERO {
            return Err(NegotiationError::InvalidPrice);
        }
        match self.side.clone() {
            NegotiationSide::Buy { .. } => Ok(self.counter_seller(price, rng)),
            NegotiationSide::Sell {
                budget, persona, ..
            } => Ok(self.counter_buyer(price, budget, persona, rng)),
        }
    }

    fn counter_seller<R: Rng + ?Sized>(&mut self, price: Decimal, rng: &mut R) -> Outcome {
        let reference = as_f64(self.reference_price());
        let offered = as_f64(price);
        let tiny = 50f64.max((reference * 0.02).round());
        let ratio = offered / reference.max(1.0);
        if offered <= tiny || ratio < 0.03 {
            return self.walk(WalkReason::Insulted);
        }
        if offered >= reference {
            self.closed = true;
            return Outcome::Deal { price };
        }
        let accept_p = (0.05 + 0.9 * ratio).clamp(0.02, 0.95);
        if rng.gen::<f64>() < accept_p {
            self.closed = true;
            return Outcome::Deal { price };
        }
        let raise = dollars(reference + rng.gen::<f64>() * (reference - offered) * 0.4);
        self.last_counter = Some(raise);
        self.spend_patience()
            .unwrap_or(Outcome::Countered { price: raise })
    }

    fn counter_buyer<R: Rng + ?Sized>(
        &mut self,
        price: Decimal,
        budget: Decimal,
        persona: Persona,
        rng: &mut R,
    ) -> Outcome {
        if price > budget {
            return self.walk(WalkReason::OverBudget);
        }
        let offer = self.reference_price();
        let offer_f = as_f64(offer);
        let asked = as_f64(price);
        let accept_p = ((0.25 + 0.5 * (offer_f / asked)) * profile(persona).accept_factor).min(0.98);
        if rng.gen::<f64>() < accept_p {
            self.closed = true;
            return Outcome::Deal { price };
        }
        // An ask under the standing offer never talks the buyer down.
        let raise = dollars(offer_f + rng.gen::<f64>() * (asked - offer_f).max(0.0) * 0.4);
        self.last_counter = Some(raise);
        self.spend_patience()
            .unwrap_or(Outcome::Countered { price: raise })
    }

    /// Burn one round of patience; returns the walk outcome once it is gone.
    fn spend_patience(&mut self) -> Option<Outcome> {
        self.patience = self.patience.saturating_sub(1);
        self.round += 1;
        if self.patience == 0 {
            Some(self.walk(WalkReason::OutOfPatience))
        } else {
            None
        }
    }

    fn walk(&mut self, reason: WalkReason) -> Outcome {
        trace!(?reason, round = self.round, "counterparty walked");
        self.walked = true;
        self.closed = true;
        self.patience = 0;
        Outcome::Walked { reason }
    }

    fn ensure_open(&self) -> Result<(), NegotiationError> {
        if self.closed {
            Err(NegotiationError::Closed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::car;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    fn buyer(persona: Persona, offer: i64, budget: i64, patience: u32) -> Buyer {
        Buyer {
            id: BuyerId::from("b_1"),
            budget: d(budget),
            offer: d(offer),
            patience,
            interest: 0.5,
            persona,
        }
    }

    #[test]
    fn insulting_counter_makes_seller_walk() {
        let mut c = car();
        c.asking = d(20_000);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut n = Negotiation::buy(&c, &mut rng);
        let out = n.counter(d(10), &mut rng).unwrap();
        assert_eq!(
            out,
            Outcome::Walked {
                reason: WalkReason::Insulted
            }
        );
        assert!(n.walked());
        assert_eq!(n.counter(d(19_000), &mut rng), Err(NegotiationError::Closed));
    }

    #[test]
    fn insult_threshold_scales_with_price() {
        let mut c = car();
        c.asking = d(20_000);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut n = Negotiation::buy(&c, &mut rng);
        // 2% of 20000 is 400
        let out = n.counter(d(400), &mut rng).unwrap();
        assert!(matches!(out, Outcome::Walked { .. }));
    }

    #[test]
    fn meeting_the_ask_closes_instantly() {
        let mut c = car();
        c.asking = d(9_000);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut n = Negotiation::buy(&c, &mut rng);
        assert_eq!(
            n.counter(d(9_000), &mut rng).unwrap(),
            Outcome::Deal { price: d(9_000) }
        );
        assert!(n.is_closed());
        assert!(!n.walked());
    }

    #[test]
    fn rejected_buy_counter_raises_above_reference() {
        let mut c = car();
        c.asking = d(10_000);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..50 {
            let mut n = Negotiation::buy(&c, &mut rng);
            let start = n.patience();
            if let Outcome::Countered { price } = n.counter(d(6_000), &mut rng).unwrap() {
                assert!(price >= d(10_000) && price <= d(11_600));
                assert_eq!(n.reference_price(), price);
                assert_eq!(n.patience(), start - 1);
                assert_eq!(n.round(), 2);
            }
        }
    }

    #[test]
    fn accept_pays_the_seller_counter_or_ask() {
        let mut c = car();
        c.asking = d(8_500);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut n = Negotiation::buy(&c, &mut rng);
        assert_eq!(n.accept().unwrap(), Outcome::Deal { price: d(8_500) });
    }

    #[test]
    fn decline_clears_seller_counter_and_costs_patience() {
        let mut c = car();
        c.asking = d(10_000);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut n = Negotiation::buy(&c, &mut rng);
        n.last_counter = Some(d(10_500));
        let p = n.patience();
        assert_eq!(n.decline().unwrap(), Outcome::Declined);
        assert_eq!(n.reference_price(), d(10_000));
        assert_eq!(n.patience(), p - 1);
    }

    #[test]
    fn counter_over_budget_makes_buyer_walk() {
        let b = buyer(Persona::Realist, 8_000, 9_500, 3);
        let mut n = Negotiation::sell(&ListingId::from("listing_1"), &b);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(
            n.counter(d(9_600), &mut rng).unwrap(),
            Outcome::Walked {
                reason: WalkReason::OverBudget
            }
        );
    }

    #[test]
    fn rejected_sell_counter_moves_offer_toward_price() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut countered = 0;
        for _ in 0..200 {
            let b = buyer(Persona::Bargain, 8_000, 12_000, 2);
            let mut n = Negotiation::sell(&ListingId::from("listing_1"), &b);
            if let Outcome::Countered { price } = n.counter(d(12_000), &mut rng).unwrap() {
                countered += 1;
                assert!(price >= d(8_000) && price <= d(9_600));
                assert_eq!(n.patience(), 1);
            }
        }
        assert!(countered > 0);
    }

    #[test]
    fn asking_the_standing_offer_is_still_a_draw() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let trials = 2_000;
        let mut deals = 0;
        for _ in 0..trials {
            let b = buyer(Persona::Bargain, 8_000, 12_000, 3);
            let mut n = Negotiation::sell(&ListingId::from("listing_1"), &b);
            match n.counter(d(8_000), &mut rng).unwrap() {
                Outcome::Deal { price } => {
                    assert_eq!(price, d(8_000));
                    deals += 1;
                }
                Outcome::Countered { price } => {
                    assert_eq!(price, d(8_000));
                    assert_eq!(n.patience(), 2);
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        // (0.25 + 0.5) * 0.85 = 0.6375
        assert!((1_125..=1_425).contains(&deals), "deals = {deals}");
    }

    #[test]
    fn asking_below_the_offer_never_lowers_it() {
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        for _ in 0..200 {
            let b = buyer(Persona::Bargain, 8_000, 12_000, 3);
            let mut n = Negotiation::sell(&ListingId::from("listing_1"), &b);
            if let Outcome::Countered { price } = n.counter(d(7_000), &mut rng).unwrap() {
                assert_eq!(price, d(8_000));
            }
        }
    }

    #[test]
    fn sell_accept_takes_current_offer() {
        let b = buyer(Persona::Collector, 9_100, 12_000, 4);
        let mut n = Negotiation::sell(&ListingId::from("listing_1"), &b);
        assert_eq!(n.accept().unwrap(), Outcome::Deal { price: d(9_100) });
        assert_eq!(n.accept(), Err(NegotiationError::Closed));
    }

    #[test]
    fn single_patience_walks_after_one_rejection() {
        let b = buyer(Persona::Impulse, 5_000, 12_000, 1);
        let mut n = Negotiation::sell(&ListingId::from("listing_1"), &b);
        assert_eq!(
            n.decline().unwrap(),
            Outcome::Walked {
                reason: WalkReason::OutOfPatience
            }
        );
        assert_eq!(n.patience_fraction(), 0.0);
    }

    #[test]
    fn non_positive_counter_is_rejected() {
        let b = buyer(Persona::Realist, 5_000, 12_000, 3);
        let mut n = Negotiation::sell(&ListingId::from("listing_1"), &b);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert_eq!(
            n.counter(d(0), &mut rng),
            Err(NegotiationError::InvalidPrice)
        );
        assert_eq!(n.patience(), 3);
    }

    proptest! {
        #[test]
        fn sessions_terminate_within_patience(
            seed in any::<u64>(),
            prices in proptest::collection::vec(1i64..30_000, 1..20),
            selling in any::<bool>(),
        ) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut n = if selling {
                Negotiation::sell(&ListingId::from("l"), &buyer(Persona::Realist, 7_000, 15_000, 4))
            } else {
                Negotiation::buy(&car(), &mut rng)
            };
            let start = n.initial_patience();
            let mut rounds = 0u32;
            let mut last_patience = n.patience();
            for p in prices {
                match n.counter(d(p), &mut rng) {
                    Ok(_) => {
                        rounds += 1;
                        prop_assert!(n.patience() <= last_patience);
                        last_patience = n.patience();
                    }
                    Err(e) => {
                        prop_assert_eq!(e, NegotiationError::Closed);
                        break;
                    }
                }
                if n.is_closed() {
                    break;
                }
            }
            prop_assert!(rounds <= start);
            if rounds == start {
                prop_assert!(n.is_closed());
            }
        }
    }
}
