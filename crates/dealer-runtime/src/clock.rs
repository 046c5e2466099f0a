//! Virtual game clock and per-action cooldowns.

use chrono::{DateTime, Datelike, Utc};
use dealer_core::{ListingId, Timestamp};
use std::collections::HashMap;

/// Simulated time. `epoch` is when the game started; days are counted from it.
#[derive(Clone, Debug)]
pub struct GameClock {
    epoch: Timestamp,
    now: Timestamp,
    day_ms: u64,
}

impl GameClock {
    pub fn new(epoch: Timestamp, now: Timestamp, day_ms: u64) -> Self {
        Self {
            epoch,
            now: now.max(epoch),
            day_ms: day_ms.max(1),
        }
    }

    pub fn epoch(&self) -> Timestamp {
        self.epoch
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Move the clock forward. Time never runs backwards.
    pub fn set(&mut self, t: Timestamp) {
        if t > self.now {
            self.now = t;
        }
    }

    /// Zero-based game day.
    pub fn day(&self) -> u64 {
        self.epoch.millis_until(self.now) / self.day_ms
    }

    /// Start of the next game day.
    pub fn next_day_at(&self) -> Timestamp {
        self.epoch.plus((self.day() + 1) * self.day_ms)
    }

    pub fn next_day_remaining(&self) -> u64 {
        self.now.millis_until(self.next_day_at())
    }

    /// Calendar year at the current time, used as the newest model year.
    pub fn current_year(&self) -> i32 {
        DateTime::<Utc>::from_timestamp_millis(self.now.0)
            .map(|d| d.year())
            .unwrap_or(1970)
    }
}

/// Actions gated by a cooldown.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CooldownKind {
    PriceUpdate(ListingId),
    MarketRefresh,
}

/// Remembers when each gated action last ran.
#[derive(Clone, Debug)]
pub struct Cooldowns {
    price_update_ms: u64,
    refresh_ms: u64,
    last: HashMap<CooldownKind, Timestamp>,
}

impl Cooldowns {
    pub fn new(price_update_ms: u64, refresh_ms: u64) -> Self {
        Self {
            price_update_ms,
            refresh_ms,
            last: HashMap::new(),
        }
    }

    fn duration(&self, kind: &CooldownKind) -> u64 {
        match kind {
            CooldownKind::PriceUpdate(_) => self.price_update_ms,
            CooldownKind::MarketRefresh => self.refresh_ms,
        }
    }

    /// Milliseconds until `kind` may run again; zero when ready.
    pub fn remaining(&self, kind: &CooldownKind, now: Timestamp) -> u64 {
        match self.last.get(kind) {
            Some(last) => now.millis_until(last.plus(self.duration(kind))),
            None => 0,
        }
    }

    pub fn mark(&mut self, kind: CooldownKind, now: Timestamp) {
        self.last.insert(kind, now);
    }

    pub fn clear(&mut self, kind: &CooldownKind) {
        self.last.remove(kind);
    }
}
