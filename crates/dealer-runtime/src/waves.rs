//! Buyer-wave scheduling on a listing.
//!
//! The listing's `wave_schedule` is the source of truth: each entry carries
//! an absolute due time and is removed when it runs, so it runs exactly once
//! even across a reload.

use dealer_ai::{plan_follow_up, plan_initial_waves, spawn_wave, WavePlan};
use dealer_core::{Buyer, Listing, ScheduledWave, Timestamp, WaveId};
use dealer_econ::uid;
use rand::Rng;
use tracing::debug;

fn to_entry<R: Rng + ?Sized>(plan: WavePlan, now: Timestamp, rng: &mut R) -> ScheduledWave {
    ScheduledWave {
        id: WaveId(uid("w", rng)),
        due_at: now.plus(plan.delay_ms),
        size: plan.size,
    }
}

/// Replace the listing's pending waves with a fresh plan for its current
/// price. Returns the new entries so the caller can arm timers for them.
pub fn schedule<R: Rng + ?Sized>(
    listing: &mut Listing,
    now: Timestamp,
    rng: &mut R,
) -> Vec<ScheduledWave> {
    let entries: Vec<ScheduledWave> = plan_initial_waves(listing.price_ratio(), rng)
        .into_iter()
        .map(|p| to_entry(p, now, rng))
        .collect();
    debug!(
        listing_id = %listing.id,
        ratio = listing.price_ratio(),
        waves = entries.len(),
        "buyer waves scheduled"
    );
    listing.wave_schedule = entries.clone();
    entries
}

/// Outcome of running one scheduled wave.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveRun {
    pub buyers: Vec<Buyer>,
    /// Extra wave drawn by a well-priced listing, already on the schedule.
    pub follow_up: Option<ScheduledWave>,
}

/// Run the scheduled wave `wave_id`: buyers join the listing and the entry is
/// removed. Returns `None` when the entry is gone (already run or replaced).
pub fn execute<R: Rng + ?Sized>(
    listing: &mut Listing,
    wave_id: &WaveId,
    now: Timestamp,
    rng: &mut R,
) -> Option<WaveRun> {
    let idx = listing.wave_schedule.iter().position(|w| &w.id == wave_id)?;
    let entry = listing.wave_schedule.remove(idx);
    let buyers = spawn_wave(listing, entry.size, rng);
    listing.buyers.extend(buyers.iter().cloned());
    listing.waves += 1;
    let follow_up = plan_follow_up(listing.price_ratio(), rng).map(|p| to_entry(p, now, rng));
    if let Some(extra) = &follow_up {
        listing.wave_schedule.push(extra.clone());
    }
    Some(WaveRun { buyers, follow_up })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::listing;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rust_decimal::Decimal;

    #[test]
    fn attractive_price_schedules_three_two_one() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        // R = 9000 / 10000 = 0.9
        let mut l = listing(Decimal::new(9_000, 0), Decimal::new(10_000, 0));
        let entries = schedule(&mut l, Timestamp(1_000), &mut rng);
        let sizes: Vec<u32> = entries.iter().map(|w| w.size).collect();
        assert_eq!(sizes, vec![3, 2, 1]);
        assert_eq!(entries[0].due_at, Timestamp(1_000));
        assert!((5_000..8_000).contains(&entries[1].due_at.0));
        assert!((9_000..13_000).contains(&entries[2].due_at.0));
        assert_eq!(l.wave_schedule, entries);
    }

    #[test]
    fn rescheduling_replaces_pending_entries() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut l = listing(Decimal::new(9_000, 0), Decimal::new(10_000, 0));
        let first = schedule(&mut l, Timestamp(0), &mut rng);
        l.list_price = Decimal::new(10_000, 0);
        let second = schedule(&mut l, Timestamp(0), &mut rng);
        assert_eq!(second.len(), 2);
        assert!(first.iter().all(|w| !l.wave_schedule.contains(w)));
    }

    #[test]
    fn each_entry_runs_once() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut l = listing(Decimal::new(10_000, 0), Decimal::new(10_000, 0));
        let entries = schedule(&mut l, Timestamp(0), &mut rng);
        let run = execute(&mut l, &entries[0].id, Timestamp(0), &mut rng).unwrap();
        assert_eq!(run.buyers.len(), 2);
        assert_eq!(l.buyers.len(), 2);
        assert_eq!(l.waves, 1);
        assert!(execute(&mut l, &entries[0].id, Timestamp(0), &mut rng).is_none());
        assert_eq!(l.waves, 1);
        assert!(l.wave_schedule.iter().all(|w| w.id != entries[0].id));
    }

    #[test]
    fn follow_up_lands_on_the_schedule() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut saw = false;
        for _ in 0..50 {
            let mut l = listing(Decimal::new(8_000, 0), Decimal::new(10_000, 0));
            let entries = schedule(&mut l, Timestamp(0), &mut rng);
            let run = execute(&mut l, &entries[0].id, Timestamp(0), &mut rng).unwrap();
            if let Some(extra) = run.follow_up {
                saw = true;
                assert!((15_000..35_000).contains(&extra.due_at.0));
                assert!(l.wave_schedule.contains(&extra));
            }
        }
        assert!(saw);
    }
}
