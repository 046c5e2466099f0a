use dealer_core::{CarId, RepairStatus, Timestamp};
use dealer_runtime::{default_templates, Dealership, EngineConfig};
use persistence::{KvStore, MemoryStore, KEY_CASH, KEY_LISTINGS};
use rust_decimal::Decimal;

const T0: Timestamp = Timestamp(1_700_000_000_000);

fn open_at(store: MemoryStore, now: Timestamp) -> Dealership<MemoryStore> {
    Dealership::open(EngineConfig::default(), default_templates(), store, now).unwrap()
}

fn buy_cheapest(game: &mut Dealership<MemoryStore>) -> CarId {
    let car = game
        .market()
        .iter()
        .min_by_key(|c| c.asking)
        .unwrap()
        .clone();
    game.purchase_car(&car.id, car.asking).unwrap();
    car.id
}

#[test]
fn past_due_waves_fire_once_on_restore() {
    let mut game = open_at(MemoryStore::new(), T0);
    let car = buy_cheapest(&mut game);
    let resale = game.inventory()[0].estimated_resale;
    let listing_id = game
        .create_listing(&car, (resale * Decimal::new(9, 1)).round())
        .unwrap();
    let listing = game.listing(&listing_id).unwrap().clone();
    assert_eq!(listing.waves, 1);
    let pending = listing.wave_schedule.clone();
    assert!(pending.len() >= 2);
    let pending_buyers: usize = pending.iter().map(|w| w.size as usize).sum();

    let later = T0.plus(1_000_000);
    let game = open_at(game.into_store(), later);
    let restored = game.listing(&listing_id).unwrap();
    assert_eq!(restored.waves as usize, 1 + pending.len());
    assert_eq!(restored.buyers.len(), 3 + pending_buyers);
    // Only follow-ups drawn at restore time remain, all in the future.
    assert!(restored.wave_schedule.iter().all(|w| w.due_at > later));
    assert!(restored.wave_schedule.iter().all(|w| !pending.contains(w)));

    let waves = restored.waves;
    let game = open_at(game.into_store(), later.plus(1));
    assert_eq!(game.listing(&listing_id).unwrap().waves, waves);
}

#[test]
fn future_waves_resume_with_remaining_delay() {
    let mut game = open_at(MemoryStore::new(), T0);
    let car = buy_cheapest(&mut game);
    let resale = game.inventory()[0].estimated_resale;
    let listing_id = game
        .create_listing(&car, (resale * Decimal::new(9, 1)).round())
        .unwrap();
    let next_due = game
        .listing(&listing_id)
        .unwrap()
        .wave_schedule
        .iter()
        .map(|w| w.due_at)
        .min()
        .unwrap();

    let mut game = open_at(game.into_store(), T0.plus(1_000));
    assert_eq!(game.listing(&listing_id).unwrap().waves, 1);
    let report = game.advance_to(next_due);
    assert!(report.waves >= 1);
    assert_eq!(game.listing(&listing_id).unwrap().waves, 2);
}

#[test]
fn finished_repair_completes_on_restore() {
    let mut game = open_at(MemoryStore::new(), T0);
    let a = buy_cheapest(&mut game);
    let b = buy_cheapest(&mut game);
    game.send_to_workshop(&a, Decimal::new(500, 0)).unwrap();
    game.send_to_workshop(&b, Decimal::new(250, 0)).unwrap();

    // Half way through the first job nothing is done yet.
    let mut game = open_at(game.into_store(), T0.plus(4_000));
    assert!(game
        .repair_jobs()
        .iter()
        .all(|j| j.status != RepairStatus::Done));
    game.advance(6_000);
    let done: Vec<_> = game
        .repair_jobs()
        .iter()
        .filter(|j| j.status == RepairStatus::Done)
        .collect();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].car_id, a);

    // Long after: the second job started on completion and is done too.
    let game = open_at(game.into_store(), T0.plus(120_000));
    assert!(game
        .repair_jobs()
        .iter()
        .all(|j| j.status == RepairStatus::Done));
    let car_b = game.inventory().iter().find(|c| c.id == b).unwrap();
    assert_eq!(car_b.repair_spent, Decimal::new(250, 0));
}

#[test]
fn malformed_save_keys_fall_back_to_defaults() {
    let mut store = MemoryStore::new();
    store.set(KEY_CASH, "\"not money\"").unwrap();
    store.set(KEY_LISTINGS, "[{\"broken\": true}]").unwrap();
    let game = open_at(store, T0);
    assert_eq!(game.cash(), Decimal::new(7_000, 0));
    assert!(game.listings().is_empty());
    assert_eq!(game.market().len(), 24);
}

#[test]
fn restored_game_keeps_its_epoch() {
    let game = open_at(MemoryStore::new(), T0);
    let game = open_at(game.into_store(), T0.plus(150_000));
    assert_eq!(game.game_day(), 2);
    assert_eq!(game.next_day_remaining(), 30_000);
}
