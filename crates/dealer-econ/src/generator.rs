//! Procedural car generation.
//!
//! A car is fully determined by its template, the current year and the draws
//! taken from the supplied RNG, in this order: year, mileage, condition,
//! damage chance, damage costs, damage count, value noise, seller archetype,
//! asking factor, reserve factor, resale factor.

use dealer_core::{
    as_f64, dollars, Car, CarId, CarStatus, Damage, DamageKind, ModelTemplate, VALUE_FLOOR,
};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::uid;

/// Probabilities and ranges driving the generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Chance that the damage branch fires at all.
    pub damage_chance: f64,
    /// Chance of a seller asking far above value.
    pub delusional_chance: f64,
    /// Chance of a seller asking below value. Wins over delusional.
    pub underpriced_chance: f64,
    /// Number of model years offered, ending at the current year.
    pub year_window: i32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            damage_chance: 0.28,
            delusional_chance: 0.14,
            underpriced_chance: 0.12,
            year_window: 26,
        }
    }
}

/// Seller pricing behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SellerArchetype {
    Underpriced,
    Delusional,
    Fair,
}

impl SellerArchetype {
    /// Asking price multiplier range over base value.
    pub fn asking_range(self) -> (f64, f64) {
        match self {
            SellerArchetype::Underpriced => (0.65, 0.80),
            SellerArchetype::Delusional => (1.3, 1.9),
            SellerArchetype::Fair => (1.05, 1.50),
        }
    }
}

/// Generate a market car from `template`.
pub fn generate_car<R: Rng + ?Sized>(
    template: &ModelTemplate,
    current_year: i32,
    cfg: &GeneratorConfig,
    rng: &mut R,
) -> Car {
    let window = cfg.year_window.max(1);
    let year = current_year - (window - 1) + rng.gen_range(0..window);
    let mileage: u32 = rng.gen_range(5_000..=220_000);
    let rolled_condition: u8 = rng.gen_range(1..=5);
    let damages = generate_damages(cfg.damage_chance, rng);
    let total_damage: Decimal = damages.iter().map(|d| d.cost).sum();
    let condition = damaged_condition(
        rolled_condition,
        as_f64(total_damage),
        !damages.is_empty(),
        template,
    );

    let age = current_year - year;
    let base = base_value(template, age, mileage, condition, rng);

    let delusional = rng.gen::<f64>() < cfg.delusional_chance;
    let underpriced = rng.gen::<f64>() < cfg.underpriced_chance;
    let archetype = if underpriced {
        SellerArchetype::Underpriced
    } else if delusional {
        SellerArchetype::Delusional
    } else {
        SellerArchetype::Fair
    };
    let (lo, hi) = archetype.asking_range();
    let asking = dollars(base * rng.gen_range(lo..hi));
    let reserve = dollars(base * rng.gen_range(0.55..1.0));

    let repair_cost = dollars(as_f64(total_damage) * 0.7);
    let resale_raw = (base * rng.gen_range(1.1..1.5)).round() - as_f64(repair_cost);
    let estimated_resale = dollars(resale_raw.max(VALUE_FLOOR as f64));

    let car = Car {
        id: CarId(uid("car", rng)),
        make: template.make.clone(),
        model: template.model.clone(),
        year,
        mileage,
        condition,
        base: dollars(base),
        asking,
        reserve,
        estimated_resale,
        damages,
        estimated_repair_cost: repair_cost,
        inspected: false,
        status: CarStatus::Market,
        purchase_price: None,
        repair_spent: Decimal::ZERO,
    };
    trace!(car_id = %car.id, ?archetype, base = %car.base, asking = %car.asking, "generated car");
    car
}

/// Roll hidden damages.
///
/// When the damage branch fires, both candidate damages are costed and a
/// prefix of random length 0, 1 or 2 is kept, so a fired branch can still
/// produce an empty list.
pub fn generate_damages<R: Rng + ?Sized>(chance: f64, rng: &mut R) -> Vec<Damage> {
    if rng.gen::<f64>() >= chance {
        return Vec::new();
    }
    let candidates = [
        Damage {
            kind: DamageKind::Body,
            cost: Decimal::from(rng.gen_range(200i64..=1200)),
        },
        Damage {
            kind: DamageKind::Mechanical,
            cost: Decimal::from(rng.gen_range(300i64..=2500)),
        },
    ];
    let keep = rng.gen_range(0..=2usize);
    candidates[..keep].to_vec()
}

/// Apply the damage penalties to a rolled condition.
fn damaged_condition(
    rolled: u8,
    total_damage: f64,
    damaged: bool,
    template: &ModelTemplate,
) -> u8 {
    if !damaged {
        return rolled;
    }
    let condition = rolled.saturating_sub(1).max(1);
    let severity = total_damage / template.market_anchor();
    let penalty = if severity > 0.5 {
        3
    } else if severity > 0.25 {
        2
    } else if severity > 0.1 {
        1
    } else {
        0
    };
    condition.saturating_sub(penalty).max(1)
}

/// Base value before seller markup, rounded and clamped to `[300, ceiling]`.
fn base_value<R: Rng + ?Sized>(
    template: &ModelTemplate,
    age: i32,
    mileage: u32,
    condition: u8,
    rng: &mut R,
) -> f64 {
    let cm = template.market_anchor();
    let noise = (rng.gen::<f64>() - 0.5) * 600.0;
    let raw = cm * (1.0 - f64::from(age) * 0.025) - f64::from(mileage) / 5000.0 * 150.0
        + f64::from(condition) * 300.0
        + noise;
    raw.round()
        .clamp(VALUE_FLOOR as f64, template.base_ceiling().floor())
}

/// Knock a market car's asking and reserve down so a few standout deals exist.
pub fn apply_standout_discount<R: Rng + ?Sized>(car: &mut Car, rng: &mut R) {
    car.asking = dollars(as_f64(car.asking) * rng.gen_range(0.55..1.15));
    car.reserve = dollars(as_f64(car.reserve) * rng.gen_range(0.45..1.05));
}
