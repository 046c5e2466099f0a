#![deny(warnings)]

//! Runtime for the car lot: one [`Dealership`] controller owning the game
//! state, the virtual clock, cooldowns, timers and the seeded RNG.
//!
//! Time only moves when the caller advances it, so a whole trading session
//! is reproducible from the config seed.

pub mod clock;
pub mod config;
pub mod dealership;
pub mod error;
pub mod events;
pub mod market;
pub mod waves;
pub mod workshop;

pub use clock::{CooldownKind, Cooldowns, GameClock};
pub use config::{default_templates, parse_templates, EngineConfig};
pub use dealership::{
    Dealership, InspectionReport, Kpis, Sale, SessionKey, TickReport, TradeStats,
};
pub use error::EngineError;
pub use events::{Event, EventOwner, EventQueue};
pub use market::MarketManager;
pub use workshop::{apply_repair, repair_duration_ms, RepairShop};
