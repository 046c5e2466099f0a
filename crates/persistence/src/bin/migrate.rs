#![deny(warnings)]

//! Normalize a save directory: load it with per-key defaults and write every
//! key back, so malformed or missing keys are replaced on disk.

use persistence::{default_save_dir, load_state, save_state, FileStore, SaveState};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_save_dir().to_string());
    let mut store = FileStore::open(&dir)?;
    let state = load_state(&store, SaveState::default());
    save_state(&mut store, &state)?;
    println!(
        "Save normalized at {} | cash: ${} | inventory: {} | listings: {} | repair jobs: {}",
        store.dir().display(),
        state.cash,
        state.inventory.len(),
        state.listings.len(),
        state.repair_jobs.len()
    );
    Ok(())
}
