#![deny(warnings)]

//! Persistence layer: key-value stores and game snapshots.
//!
//! The game state is saved as one JSON document per key (`cash`, `inventory`,
//! `listings`, `repairJobs`, `gameEpoch`). Loading never fails: a missing or
//! malformed key falls back to its default and a warning is logged.

use anyhow::{Context, Result};
use dealer_core::{Car, Listing, RepairJob, Timestamp};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const KEY_CASH: &str = "cash";
pub const KEY_INVENTORY: &str = "inventory";
pub const KEY_LISTINGS: &str = "listings";
pub const KEY_REPAIR_JOBS: &str = "repairJobs";
pub const KEY_GAME_EPOCH: &str = "gameEpoch";

/// All persisted keys, in save order.
pub const KEYS: [&str; 5] = [
    KEY_CASH,
    KEY_INVENTORY,
    KEY_LISTINGS,
    KEY_REPAIR_JOBS,
    KEY_GAME_EPOCH,
];

/// Cash a new game starts with.
pub const STARTING_CASH: i64 = 7000;

/// Returns the default directory used for local saves.
pub fn default_save_dir() -> &'static str {
    "./saves/main"
}

/// String key-value storage, one JSON document per key.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// In-memory store, used by tests and throwaway sessions.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Directory-backed store: each key lives in `<dir>/<key>.json`.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a save directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating save directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let text =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        Ok(Some(text))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        // Write-then-rename so a crash never leaves a half-written key behind.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
        }
        Ok(())
    }
}

/// Everything that survives a reload. The market is regenerated on start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveState {
    pub cash: Decimal,
    pub inventory: Vec<Car>,
    pub listings: Vec<Listing>,
    pub repair_jobs: Vec<RepairJob>,
    /// Start of simulated time; `None` for a fresh game.
    pub game_epoch: Option<Timestamp>,
}

impl SaveState {
    /// Fresh game with `starting_cash`.
    pub fn new(starting_cash: Decimal) -> Self {
        Self {
            cash: starting_cash,
            inventory: Vec::new(),
            listings: Vec::new(),
            repair_jobs: Vec::new(),
            game_epoch: None,
        }
    }
}

impl Default for SaveState {
    fn default() -> Self {
        Self::new(Decimal::from(STARTING_CASH))
    }
}

fn load_key<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key, "save key missing, using default");
            return None;
        }
        Err(e) => {
            warn!(key, error = %e, "failed to read save key, using default");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, error = %e, "malformed save key, using default");
            None
        }
    }
}

/// Load a snapshot, replacing missing or malformed keys with `defaults`.
pub fn load_state(store: &dyn KvStore, defaults: SaveState) -> SaveState {
    SaveState {
        cash: load_key(store, KEY_CASH).unwrap_or(defaults.cash),
        inventory: load_key(store, KEY_INVENTORY).unwrap_or(defaults.inventory),
        listings: load_key(store, KEY_LISTINGS).unwrap_or(defaults.listings),
        repair_jobs: load_key(store, KEY_REPAIR_JOBS).unwrap_or(defaults.repair_jobs),
        game_epoch: load_key::<Timestamp>(store, KEY_GAME_EPOCH).or(defaults.game_epoch),
    }
}

fn save_key<T: Serialize>(store: &mut dyn KvStore, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value).with_context(|| format!("serializing {key}"))?;
    store.set(key, &json)
}

/// Write every key of `state`.
pub fn save_state(store: &mut dyn KvStore, state: &SaveState) -> Result<()> {
    save_key(store, KEY_CASH, &state.cash)?;
    save_key(store, KEY_INVENTORY, &state.inventory)?;
    save_key(store, KEY_LISTINGS, &state.listings)?;
    save_key(store, KEY_REPAIR_JOBS, &state.repair_jobs)?;
    match state.game_epoch {
        Some(epoch) => save_key(store, KEY_GAME_EPOCH, &epoch)?,
        None => store.remove(KEY_GAME_EPOCH)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealer_core::{CarId, CarStatus, JobId, RepairStatus};

    fn car() -> Car {
        Car {
            id: CarId::from("car_1"),
            make: "VW".to_string(),
            model: "Golf".to_string(),
            year: 2014,
            mileage: 120_000,
            condition: 3,
            base: Decimal::new(6_000, 0),
            asking: Decimal::new(6_900, 0),
            reserve: Decimal::new(4_500, 0),
            estimated_resale: Decimal::new(7_200, 0),
            damages: vec![],
            estimated_repair_cost: Decimal::ZERO,
            inspected: true,
            status: CarStatus::Owned,
            purchase_price: Some(Decimal::new(6_100, 0)),
            repair_spent: Decimal::ZERO,
        }
    }

    #[test]
    fn save_dir_is_relative() {
        assert!(default_save_dir().starts_with("./"));
    }

    #[test]
    fn empty_store_loads_defaults() {
        let store = MemoryStore::new();
        let state = load_state(&store, SaveState::default());
        assert_eq!(state, SaveState::default());
        assert_eq!(state.cash, Decimal::new(7000, 0));
    }

    #[test]
    fn malformed_keys_fall_back_per_key() {
        let mut store = MemoryStore::new();
        store.set(KEY_CASH, "\"12345\"").unwrap();
        store.set(KEY_INVENTORY, "{not json").unwrap();
        store.set(KEY_LISTINGS, "42").unwrap();
        store.set(KEY_GAME_EPOCH, "1700000000000").unwrap();
        let state = load_state(&store, SaveState::default());
        assert_eq!(state.cash, Decimal::new(12_345, 0));
        assert!(state.inventory.is_empty());
        assert!(state.listings.is_empty());
        assert_eq!(state.game_epoch, Some(Timestamp(1_700_000_000_000)));
    }

    #[test]
    fn plain_number_cash_is_accepted() {
        let mut store = MemoryStore::new();
        store.set(KEY_CASH, "8250").unwrap();
        let state = load_state(&store, SaveState::default());
        assert_eq!(state.cash, Decimal::new(8_250, 0));
    }

    #[test]
    fn save_then_load_restores_snapshot() {
        let mut store = MemoryStore::new();
        let state = SaveState {
            cash: Decimal::new(3_210, 0),
            inventory: vec![car()],
            listings: vec![],
            repair_jobs: vec![RepairJob {
                id: JobId::from("job_1"),
                car_id: CarId::from("car_1"),
                cost: Decimal::new(500, 0),
                status: RepairStatus::InProgress,
                created_at: Timestamp(10),
                start_at: Some(Timestamp(20)),
                duration_ms: 10_000,
                completed_at: None,
            }],
            game_epoch: Some(Timestamp(5)),
        };
        save_state(&mut store, &state).unwrap();
        assert!(store.get(KEY_REPAIR_JOBS).unwrap().unwrap().contains("in-progress"));
        assert_eq!(load_state(&store, SaveState::default()), state);
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("car-lot-save-{}", std::process::id()));
        let mut store = FileStore::open(&dir).unwrap();
        assert_eq!(store.get("cash").unwrap(), None);
        store.set("cash", "100").unwrap();
        assert_eq!(store.get("cash").unwrap().as_deref(), Some("100"));
        store.remove("cash").unwrap();
        assert_eq!(store.get("cash").unwrap(), None);
        let _ = fs::remove_dir_all(&dir);
    }
}
