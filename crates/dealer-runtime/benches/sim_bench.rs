use criterion::{criterion_group, criterion_main, Criterion};
use dealer_core::Timestamp;
use dealer_runtime::{default_templates, Dealership, EngineConfig};
use persistence::MemoryStore;

fn bench_days(c: &mut Criterion) {
    let mut game = Dealership::open(
        EngineConfig::default(),
        default_templates(),
        MemoryStore::new(),
        Timestamp(1_700_000_000_000),
    )
    .unwrap();
    c.bench_function("advance one game day", |b| {
        b.iter(|| {
            let _ = game.advance(60_000);
        })
    });
}

fn bench_list_and_sell(c: &mut Criterion) {
    c.bench_function("buy, list and sell", |b| {
        b.iter(|| {
            let mut game = Dealership::open(
                EngineConfig::default(),
                default_templates(),
                MemoryStore::new(),
                Timestamp(1_700_000_000_000),
            )
            .unwrap();
            let car = game
                .market()
                .iter()
                .min_by_key(|c| c.asking)
                .unwrap()
                .clone();
            if game.accept_seller(&car.id).is_err() {
                return;
            }
            let Ok(listing_id) = game.create_listing(&car.id, car.estimated_resale) else {
                return;
            };
            game.advance(15_000);
            let buyer = game
                .listing(&listing_id)
                .and_then(|l| l.buyers.first())
                .map(|b| b.id.clone());
            if let Some(buyer) = buyer {
                let _ = game.accept_offer(&listing_id, &buyer);
            }
        })
    });
}

criterion_group!(benches, bench_days, bench_list_and_sell);
criterion_main!(benches);
