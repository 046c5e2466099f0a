//! Engine tunables and model template loading.

use dealer_core::{validate_template, ModelTemplate};
use dealer_econ::GeneratorConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::EngineError;

/// Tunables for one dealership. Every field has a default, so a config file
/// only needs the keys it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cars kept on the market after a refresh.
    pub market_size: usize,
    /// Share of the market replaced by a non-empty refresh.
    pub churn: f64,
    /// Length of one game day in milliseconds.
    pub game_day_ms: u64,
    pub price_update_cooldown_ms: u64,
    pub refresh_cooldown_ms: u64,
    /// Lowest workshop quote.
    pub repair_min_cost: Decimal,
    pub starting_cash: Decimal,
    pub rng_seed: u64,
    pub generator: GeneratorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            market_size: 24,
            churn: 0.30,
            game_day_ms: 60_000,
            price_update_cooldown_ms: 60_000,
            refresh_cooldown_ms: 60_000,
            repair_min_cost: Decimal::new(200, 0),
            starting_cash: Decimal::new(7_000, 0),
            rng_seed: 42,
            generator: GeneratorConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(text: &str) -> Result<Self, EngineError> {
        let cfg: EngineConfig =
            serde_yaml::from_str(text).map_err(|e| EngineError::InvalidInput(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.market_size == 0 {
            return Err(EngineError::InvalidInput("market_size must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.churn) {
            return Err(EngineError::InvalidInput("churn must be in [0,1]".into()));
        }
        if self.game_day_ms == 0 {
            return Err(EngineError::InvalidInput("game_day_ms must be > 0".into()));
        }
        if self.starting_cash < Decimal::ZERO {
            return Err(EngineError::InvalidInput("starting_cash must be >= 0".into()));
        }
        Ok(())
    }
}

/// Parse model templates from a JSON array or a YAML list. Invalid entries
/// are skipped with a warning.
pub fn parse_templates(text: &str) -> Result<Vec<ModelTemplate>, EngineError> {
    let parsed: Vec<ModelTemplate> = if text.trim_start().starts_with('[') {
        serde_json::from_str(text).map_err(|e| EngineError::InvalidInput(e.to_string()))?
    } else {
        serde_yaml::from_str(text).map_err(|e| EngineError::InvalidInput(e.to_string()))?
    };
    Ok(parsed
        .into_iter()
        .filter(|t| match validate_template(t) {
            Ok(()) => true,
            Err(e) => {
                warn!(make = %t.make, model = %t.model, error = %e, "skipping model template");
                false
            }
        })
        .collect())
}

/// A small built-in catalogue used when no template file is available.
pub fn default_templates() -> Vec<ModelTemplate> {
    [
        ("Toyota", "Corolla", 9_500.0),
        ("Honda", "Civic", 10_000.0),
        ("Ford", "Focus", 7_000.0),
        ("Volkswagen", "Golf", 9_000.0),
        ("Mazda", "3", 8_500.0),
        ("Subaru", "Outback", 12_000.0),
        ("BMW", "3 Series", 14_000.0),
        ("Chevrolet", "Malibu", 7_500.0),
        ("Nissan", "Altima", 7_800.0),
        ("Hyundai", "Elantra", 7_200.0),
    ]
    .into_iter()
    .map(|(make, model, cm)| ModelTemplate {
        make: make.to_string(),
        model: model.to_string(),
        common_market: cm,
    })
    .collect()
}
