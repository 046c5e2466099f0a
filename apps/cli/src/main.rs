#![deny(warnings)]

//! Headless CLI: runs a scripted trading session on the virtual clock and
//! prints the resulting KPIs.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use dealer_core::{CarId, Timestamp};
use dealer_econ::{buyer_interest, listing_heat, rate_deal, DealRating};
use dealer_runtime::{
    default_templates, parse_templates, Dealership, EngineConfig, EngineError, Kpis,
};
use persistence::{FileStore, KvStore, MemoryStore};
use rust_decimal::Decimal;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

const STEP_MS: u64 = 5_000;
const LIST_MARGIN_PCT: f64 = 10.0;

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    models: Option<PathBuf>,
    save_dir: Option<PathBuf>,
    days: Option<u32>,
    seed: Option<u64>,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next().map(PathBuf::from),
            "--models" => args.models = it.next().map(PathBuf::from),
            "--save" => args.save_dir = it.next().map(PathBuf::from),
            "--days" => args.days = it.next().and_then(|s| s.parse().ok()),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--json" => args.json = true,
            "--version" => {
                println!(
                    "car-lot cli {} ({} built {})",
                    env!("CARGO_PKG_VERSION"),
                    env!("GIT_SHA"),
                    env!("BUILD_DATE")
                );
                std::process::exit(0);
            }
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    args
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let path = path.unwrap_or_else(|| Path::new("assets/config.yaml"));
    if !path.exists() {
        warn!(path = %path.display(), "config not found, using defaults");
        return Ok(EngineConfig::default());
    }
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(EngineConfig::from_yaml(&text)?)
}

fn load_models(path: Option<&Path>) -> Result<Vec<dealer_core::ModelTemplate>> {
    let path = path.unwrap_or_else(|| Path::new("assets/models.yaml"));
    if !path.exists() {
        warn!(path = %path.display(), "model templates not found, using built-in list");
        return Ok(default_templates());
    }
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let templates = parse_templates(&text)?;
    if templates.is_empty() {
        warn!("template file has no usable entries, using built-in list");
        return Ok(default_templates());
    }
    Ok(templates)
}

fn wall_clock() -> Timestamp {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    Timestamp(i64::try_from(ms).unwrap_or(i64::MAX))
}

/// Buy cars the market underprices, fix them, list them a little over
/// resale, and take the first offer that clears what was spent.
fn trade_step<S: KvStore>(game: &mut Dealership<S>) {
    // Buying: inspect promising cars, then haggle from 85% of asking.
    let candidates: Vec<CarId> = game
        .market()
        .iter()
        .filter(|c| {
            matches!(
                rate_deal(c.asking, c.estimated_resale),
                DealRating::Great | DealRating::Good
            )
        })
        .map(|c| c.id.clone())
        .collect();
    for car_id in candidates {
        let Ok(report) = game.inspect_car(&car_id) else {
            continue;
        };
        let Some(car) = game.market().iter().find(|c| c.id == car_id).cloned() else {
            continue;
        };
        if report.estimated_repair_cost * Decimal::new(2, 0) > car.estimated_resale - car.asking {
            debug!(%car_id, "repairs eat the margin, skipping");
            continue;
        }
        let offer = (car.asking * Decimal::new(85, 2)).round();
        match game.counter_seller(&car_id, offer) {
            Ok(outcome) => debug!(%car_id, %offer, ?outcome, "offered"),
            Err(EngineError::InsufficientFunds { .. }) => break,
            Err(e) => debug!(%car_id, error = %e, "offer rejected"),
        }
    }

    // Workshop and listing.
    let owned: Vec<_> = game.inventory().to_vec();
    for car in owned {
        if !car.damages.is_empty() {
            if let Ok(quote) = game.repair_quote(&car.id) {
                if let Err(e) = game.send_to_workshop(&car.id, quote) {
                    debug!(car_id = %car.id, error = %e, "not sent to the workshop");
                }
            }
            continue;
        }
        if let Ok(price) = game.suggested_price(&car.id, LIST_MARGIN_PCT) {
            let price = price.max(car.total_spent() + Decimal::new(100, 0));
            if let Err(e) = game.create_listing(&car.id, price) {
                debug!(car_id = %car.id, error = %e, "not listed");
            }
        }
    }

    // Selling: take the best offer above cost, otherwise ask for the list price.
    let listings: Vec<_> = game.listings().to_vec();
    for listing in listings {
        debug!(
            listing_id = %listing.id,
            heat = listing_heat(listing.price_ratio()),
            interest = buyer_interest(listing.list_price, listing.car.estimated_resale),
            buyers = listing.buyers.len(),
            "checking offers"
        );
        let Some(best) = listing.buyers.iter().max_by_key(|b| b.offer) else {
            continue;
        };
        if best.offer >= listing.car.total_spent() {
            if let Ok(sale) = game.accept_offer(&listing.id, &best.id) {
                info!(car = %sale.car.title(), price = %sale.price, profit = %sale.profit, "sold");
            }
        } else {
            match game.counter_offer(&listing.id, &best.id, listing.list_price) {
                Ok(outcome) => debug!(
                    listing_id = %listing.id,
                    buyer_id = %best.id,
                    ?outcome,
                    "asked list price"
                ),
                Err(e) => debug!(listing_id = %listing.id, error = %e, "counter rejected"),
            }
        }
    }
}

fn run<S: KvStore>(mut game: Dealership<S>, days: u32) -> Kpis {
    let steps = (game.config().game_day_ms / STEP_MS).max(1);
    for day in 0..days {
        for _ in 0..steps {
            trade_step(&mut game);
            game.advance(STEP_MS);
        }
        debug!(day, cash = %game.cash(), "day finished");
    }
    game.kpis()
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.rng_seed = seed;
    }
    let templates = load_models(args.models.as_deref())?;
    let days = args.days.unwrap_or(3);
    info!(days, templates = templates.len(), seed = config.rng_seed, "starting session");

    let now = wall_clock();
    let kpis = match &args.save_dir {
        Some(dir) => run(Dealership::open(config, templates, FileStore::open(dir)?, now)?, days),
        None => run(Dealership::open(config, templates, MemoryStore::new(), now)?, days),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&kpis)?);
    } else {
        println!(
            "KPI | day: {} | cash: ${} | stock value: ${} | market: {} | inventory: {} | listings: {} | buyers: {} | repairs: {}",
            kpis.day,
            kpis.cash,
            kpis.stock_value,
            kpis.market_cars,
            kpis.inventory_cars,
            kpis.listings,
            kpis.waiting_buyers,
            kpis.pending_repairs
        );
        println!(
            "Trades | bought: {} (${}) | sold: {} (${}) | realized profit: ${}",
            kpis.stats.cars_bought,
            kpis.stats.purchases,
            kpis.stats.cars_sold,
            kpis.stats.revenue,
            kpis.stats.realized_profit
        );
    }
    Ok(())
}
