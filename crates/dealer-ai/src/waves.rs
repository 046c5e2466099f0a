//! Buyer wave planning.
//!
//! Planning is pure: it turns a listing's price ratio into relative delays
//! and wave sizes. The runtime owns the clock and turns plans into persisted
//! [`dealer_core::ScheduledWave`] entries.

use dealer_core::{Buyer, Listing};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::personas::spawn_buyer;

/// Price bracket of a listing relative to its valuation anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceBracket {
    /// Ratio <= 0.95.
    Attractive,
    /// Ratio <= 1.05.
    Reasonable,
    /// Ratio <= 1.15.
    Fair,
    /// Anything above.
    Overpriced,
}

impl PriceBracket {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio <= 0.95 {
            PriceBracket::Attractive
        } else if ratio <= 1.05 {
            PriceBracket::Reasonable
        } else if ratio <= 1.15 {
            PriceBracket::Fair
        } else {
            PriceBracket::Overpriced
        }
    }
}

/// A wave to schedule `delay_ms` from now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavePlan {
    pub delay_ms: u64,
    pub size: u32,
}

impl WavePlan {
    fn new(delay_ms: u64, size: u32) -> Self {
        Self { delay_ms, size }
    }
}

/// Initial waves for a freshly listed or re-priced car.
pub fn plan_initial_waves<R: Rng + ?Sized>(ratio: f64, rng: &mut R) -> Vec<WavePlan> {
    match PriceBracket::from_ratio(ratio) {
        PriceBracket::Attractive => vec![
            WavePlan::new(0, 3),
            WavePlan::new(rng.gen_range(4_000..7_000), 2),
            WavePlan::new(rng.gen_range(8_000..12_000), 1),
        ],
        PriceBracket::Reasonable => vec![
            WavePlan::new(0, 2),
            WavePlan::new(rng.gen_range(5_000..9_000), 1),
        ],
        PriceBracket::Fair => {
            let mut plan = vec![WavePlan::new(0, 1)];
            if rng.gen::<f64>() < 0.4 {
                plan.push(WavePlan::new(rng.gen_range(6_000..10_000), 1));
            }
            plan
        }
        PriceBracket::Overpriced => {
            if rng.gen::<f64>() < 0.25 {
                vec![WavePlan::new(0, 1)]
            } else {
                Vec::new()
            }
        }
    }
}

/// Optional extra wave after a scheduled wave has run. Hot listings keep
/// drawing buyers, with decaying odds.
pub fn plan_follow_up<R: Rng + ?Sized>(ratio: f64, rng: &mut R) -> Option<WavePlan> {
    match PriceBracket::from_ratio(ratio) {
        PriceBracket::Attractive => {
            if rng.gen::<f64>() < 0.6 {
                let delay = rng.gen_range(15_000..35_000);
                Some(WavePlan::new(delay, rng.gen_range(1..=2)))
            } else {
                None
            }
        }
        PriceBracket::Reasonable => {
            if rng.gen::<f64>() < 0.25 {
                Some(WavePlan::new(rng.gen_range(25_000..55_000), 1))
            } else {
                None
            }
        }
        PriceBracket::Fair | PriceBracket::Overpriced => None,
    }
}

/// Generate the buyers of one wave.
pub fn spawn_wave<R: Rng + ?Sized>(listing: &Listing, size: u32, rng: &mut R) -> Vec<Buyer> {
    (0..size).map(|_| spawn_buyer(listing, rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::listing;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rust_decimal::Decimal;

    #[test]
    fn brackets_from_ratio() {
        assert_eq!(PriceBracket::from_ratio(0.9), PriceBracket::Attractive);
        assert_eq!(PriceBracket::from_ratio(0.95), PriceBracket::Attractive);
        assert_eq!(PriceBracket::from_ratio(1.0), PriceBracket::Reasonable);
        assert_eq!(PriceBracket::from_ratio(1.15), PriceBracket::Fair);
        assert_eq!(PriceBracket::from_ratio(1.16), PriceBracket::Overpriced);
    }

    #[test]
    fn attractive_listing_gets_three_waves() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            let plan = plan_initial_waves(0.9, &mut rng);
            let sizes: Vec<u32> = plan.iter().map(|w| w.size).collect();
            assert_eq!(sizes, vec![3, 2, 1]);
            assert_eq!(plan[0].delay_ms, 0);
            assert!((4_000..7_000).contains(&plan[1].delay_ms));
            assert!((8_000..12_000).contains(&plan[2].delay_ms));
        }
    }

    #[test]
    fn reasonable_and_fair_brackets() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut saw_second_fair_wave = false;
        for _ in 0..200 {
            let plan = plan_initial_waves(1.0, &mut rng);
            assert_eq!(plan.len(), 2);
            assert_eq!((plan[0].delay_ms, plan[0].size), (0, 2));
            assert!((5_000..9_000).contains(&plan[1].delay_ms));

            let fair = plan_initial_waves(1.1, &mut rng);
            assert!(fair.len() == 1 || fair.len() == 2);
            assert_eq!((fair[0].delay_ms, fair[0].size), (0, 1));
            if let Some(second) = fair.get(1) {
                saw_second_fair_wave = true;
                assert!((6_000..10_000).contains(&second.delay_ms));
                assert_eq!(second.size, 1);
            }
        }
        assert!(saw_second_fair_wave);
    }

    #[test]
    fn overpriced_gets_at_most_one_immediate_wave() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut fired = 0;
        for _ in 0..400 {
            let plan = plan_initial_waves(1.6, &mut rng);
            assert!(plan.len() <= 1);
            if let Some(w) = plan.first() {
                assert_eq!((w.delay_ms, w.size), (0, 1));
                fired += 1;
            }
        }
        assert!(fired > 40 && fired < 180, "fired {fired}");
    }

    #[test]
    fn follow_ups_only_for_hot_listings() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..200 {
            if let Some(w) = plan_follow_up(0.9, &mut rng) {
                assert!((15_000..35_000).contains(&w.delay_ms));
                assert!((1..=2).contains(&w.size));
            }
            if let Some(w) = plan_follow_up(1.0, &mut rng) {
                assert!((25_000..55_000).contains(&w.delay_ms));
                assert_eq!(w.size, 1);
            }
            assert!(plan_follow_up(1.1, &mut rng).is_none());
            assert!(plan_follow_up(2.0, &mut rng).is_none());
        }
    }

    #[test]
    fn wave_spawns_requested_size() {
        let l = listing(Decimal::new(9_000, 0), Decimal::new(10_000, 0));
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert_eq!(spawn_wave(&l, 3, &mut rng).len(), 3);
        assert!(spawn_wave(&l, 0, &mut rng).is_empty());
    }
}
