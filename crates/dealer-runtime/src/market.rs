//! Market manager: the pool of cars the player can buy.

use dealer_core::{Car, CarId, ModelTemplate, Timestamp};
use dealer_econ::{apply_standout_discount, generate_car, GeneratorConfig};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::clock::{CooldownKind, Cooldowns};
use crate::EngineConfig;

/// Share of a freshly populated market that gets a standout discount.
const FRESH_DISCOUNT_SHARE: f64 = 0.08;
/// Chance that a churn replacement gets a standout discount.
const REPLACEMENT_DISCOUNT_CHANCE: f64 = 0.06;

#[derive(Clone, Debug)]
pub struct MarketManager {
    templates: Vec<ModelTemplate>,
    generator: GeneratorConfig,
    size: usize,
    churn: f64,
    cars: Vec<Car>,
}

impl MarketManager {
    pub fn new(templates: Vec<ModelTemplate>, cfg: &EngineConfig) -> Self {
        if templates.is_empty() {
            warn!("no model templates; the market will stay empty");
        }
        Self {
            templates,
            generator: cfg.generator.clone(),
            size: cfg.market_size,
            churn: cfg.churn,
            cars: Vec::new(),
        }
    }

    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    pub fn car(&self, id: &CarId) -> Option<&Car> {
        self.cars.iter().find(|c| &c.id == id)
    }

    pub fn car_mut(&mut self, id: &CarId) -> Option<&mut Car> {
        self.cars.iter_mut().find(|c| &c.id == id)
    }

    /// Remove a car from the market (bought, or its seller walked).
    pub fn take(&mut self, id: &CarId) -> Option<Car> {
        let idx = self.cars.iter().position(|c| &c.id == id)?;
        Some(self.cars.remove(idx))
    }

    /// Refresh the market unless the refresh cooldown is running. `force`
    /// skips the cooldown. Returns whether the market changed.
    ///
    /// An empty market is filled completely. Otherwise the newest `churn`
    /// share of the cars currently on offer is dropped, always keeping at
    /// least one, and the market is topped back up to size.
    pub fn refresh<R: Rng + ?Sized>(
        &mut self,
        cooldowns: &mut Cooldowns,
        now: Timestamp,
        force: bool,
        current_year: i32,
        rng: &mut R,
    ) -> bool {
        let remaining = cooldowns.remaining(&CooldownKind::MarketRefresh, now);
        if !force && remaining > 0 {
            debug!(remaining_ms = remaining, "market refresh on cooldown");
            return false;
        }
        cooldowns.mark(CooldownKind::MarketRefresh, now);

        if self.cars.is_empty() {
            let discounted = ((self.size as f64 * FRESH_DISCOUNT_SHARE).round() as usize).max(1);
            for i in 0..self.size {
                let Some(mut car) = self.generate(current_year, rng) else {
                    break;
                };
                if i < discounted {
                    apply_standout_discount(&mut car, rng);
                }
                self.cars.push(car);
            }
            info!(cars = self.cars.len(), "market populated");
        } else {
            let keep = ((self.cars.len() as f64 * (1.0 - self.churn)).floor() as usize).max(1);
            self.cars.truncate(keep);
            let kept = self.cars.len();
            while self.cars.len() < self.size {
                let Some(mut car) = self.generate(current_year, rng) else {
                    break;
                };
                if rng.gen::<f64>() < REPLACEMENT_DISCOUNT_CHANCE {
                    apply_standout_discount(&mut car, rng);
                }
                self.cars.push(car);
            }
            info!(kept, replaced = self.cars.len() - kept, "market refreshed");
        }
        true
    }

    fn generate<R: Rng + ?Sized>(&self, current_year: i32, rng: &mut R) -> Option<Car> {
        if self.templates.is_empty() {
            return None;
        }
        let template = &self.templates[rng.gen_range(0..self.templates.len())];
        Some(generate_car(template, current_year, &self.generator, rng))
    }
}
