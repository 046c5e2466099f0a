//! The dealership controller and every player-facing operation.

use std::collections::HashMap;

use dealer_ai::{Negotiation, Outcome};
use dealer_core::{
    BuyerId, Car, CarId, CarStatus, Damage, JobId, Listing, ListingId, ModelTemplate, RepairJob,
    ScheduledWave, Timestamp, WaveId,
};
use dealer_econ::{inspection_cost, profit, profit_pct, repair_quote, suggested_list_price, uid};
use persistence::{load_state, save_state, KvStore, SaveState};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{CooldownKind, Cooldowns, GameClock};
use crate::events::{Event, EventOwner, EventQueue};
use crate::market::MarketManager;
use crate::workshop::{apply_repair, RepairShop};
use crate::{waves, EngineConfig, EngineError};

/// Identifies an open negotiation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Buying a market car from its seller.
    Seller(CarId),
    /// Selling a listing to one of its buyers.
    Buyer(ListingId, BuyerId),
}

/// A closed sale.
#[derive(Clone, Debug, PartialEq)]
pub struct Sale {
    pub listing_id: ListingId,
    pub car: Car,
    pub price: Decimal,
    pub profit: Decimal,
    pub profit_pct: Option<i64>,
}

/// What an inspection revealed.
#[derive(Clone, Debug, PartialEq)]
pub struct InspectionReport {
    pub car_id: CarId,
    pub cost: Decimal,
    pub damages: Vec<Damage>,
    pub estimated_repair_cost: Decimal,
}

/// What happened while the clock advanced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub waves: u32,
    pub buyers: usize,
    pub repairs_completed: u32,
    pub day_rollovers: u32,
}

/// Running totals for the current session. Not persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStats {
    pub cars_bought: u32,
    pub cars_sold: u32,
    pub purchases: Decimal,
    pub revenue: Decimal,
    pub realized_profit: Decimal,
}

/// Headline numbers for reporting.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub day: u64,
    pub cash: Decimal,
    pub market_cars: usize,
    pub inventory_cars: usize,
    pub listings: usize,
    pub waiting_buyers: usize,
    pub pending_repairs: usize,
    /// Estimated resale of everything the player owns.
    pub stock_value: Decimal,
    pub stats: TradeStats,
}

pub struct Dealership<S: KvStore> {
    config: EngineConfig,
    clock: GameClock,
    cooldowns: Cooldowns,
    market: MarketManager,
    cash: Decimal,
    inventory: Vec<Car>,
    listings: Vec<Listing>,
    workshop: RepairShop,
    events: EventQueue,
    sessions: HashMap<SessionKey, Negotiation>,
    stats: TradeStats,
    rng: ChaCha8Rng,
    store: S,
}

fn ensure_positive(value: Decimal, what: &str) -> Result<(), EngineError> {
    if value <= Decimal::ZERO {
        return Err(EngineError::InvalidInput(format!("{what} must be > 0")));
    }
    Ok(())
}

impl<S: KvStore> Dealership<S> {
    /// Load the game saved in `store` (or start a new one) at time `now`.
    ///
    /// Pending waves and repairs are re-armed from their persisted absolute
    /// times; anything already due runs immediately. The market is always
    /// regenerated.
    pub fn open(
        config: EngineConfig,
        templates: Vec<ModelTemplate>,
        store: S,
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let state = load_state(&store, SaveState::new(config.starting_cash));
        let restored = state.game_epoch.is_some();
        let epoch = state.game_epoch.unwrap_or(now);
        // Ids are random; a restored game must not replay the ids it already handed out.
        let seed = if restored {
            config.rng_seed ^ now.0 as u64
        } else {
            config.rng_seed
        };
        info!(
            restored,
            cash = %state.cash,
            inventory = state.inventory.len(),
            listings = state.listings.len(),
            jobs = state.repair_jobs.len(),
            "opening dealership"
        );

        let mut dealership = Self {
            clock: GameClock::new(epoch, now, config.game_day_ms),
            cooldowns: Cooldowns::new(config.price_update_cooldown_ms, config.refresh_cooldown_ms),
            market: MarketManager::new(templates, &config),
            cash: state.cash,
            inventory: state.inventory,
            listings: state.listings,
            workshop: RepairShop::new(state.repair_jobs),
            events: EventQueue::new(),
            sessions: HashMap::new(),
            stats: TradeStats::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            store,
            config,
        };
        dealership.rehydrate();
        let year = dealership.clock.current_year();
        dealership.market.refresh(
            &mut dealership.cooldowns,
            now,
            true,
            year,
            &mut dealership.rng,
        );
        dealership.settle();
        Ok(dealership)
    }

    fn rehydrate(&mut self) {
        let demoted = self.workshop.enforce_single_bay();
        if demoted > 0 {
            warn!(demoted, "save had several running repairs; requeued extras");
        }
        let now = self.clock.now();
        for listing in &self.listings {
            for wave in &listing.wave_schedule {
                self.events.schedule(
                    wave.due_at,
                    Event::Wave {
                        listing_id: listing.id.clone(),
                        wave_id: wave.id.clone(),
                    },
                );
            }
        }
        if let Some(job) = self.workshop.in_progress() {
            let due = job.finishes_at().unwrap_or_else(|| now.plus(job.duration_ms));
            self.events.schedule(
                due,
                Event::RepairComplete {
                    job_id: job.id.clone(),
                },
            );
        }
        debug!(timers = self.events.len(), "timers re-armed");
    }

    // ----- accessors -----

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn market(&self) -> &[Car] {
        self.market.cars()
    }

    pub fn inventory(&self) -> &[Car] {
        &self.inventory
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn listing(&self, id: &ListingId) -> Option<&Listing> {
        self.listings.iter().find(|l| &l.id == id)
    }

    pub fn repair_jobs(&self) -> &[RepairJob] {
        self.workshop.jobs()
    }

    pub fn negotiation(&self, key: &SessionKey) -> Option<&Negotiation> {
        self.sessions.get(key)
    }

    pub fn stats(&self) -> &TradeStats {
        &self.stats
    }

    pub fn game_day(&self) -> u64 {
        self.clock.day()
    }

    pub fn next_day_remaining(&self) -> u64 {
        self.clock.next_day_remaining()
    }

    pub fn cooldown_remaining(&self, kind: &CooldownKind) -> u64 {
        self.cooldowns.remaining(kind, self.clock.now())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Hand the store back, e.g. to reopen the same save later.
    pub fn into_store(self) -> S {
        self.store
    }

    pub fn kpis(&self) -> Kpis {
        let stock_value = self
            .inventory
            .iter()
            .chain(self.listings.iter().map(|l| &l.car))
            .map(|c| c.estimated_resale)
            .sum();
        Kpis {
            day: self.game_day(),
            cash: self.cash,
            market_cars: self.market.cars().len(),
            inventory_cars: self.inventory.len(),
            listings: self.listings.len(),
            waiting_buyers: self.listings.iter().map(|l| l.buyers.len()).sum(),
            pending_repairs: self
                .workshop
                .jobs()
                .iter()
                .filter(|j| j.status.is_pending())
                .count(),
            stock_value,
            stats: self.stats.clone(),
        }
    }

    // ----- clock -----

    pub fn advance(&mut self, ms: u64) -> TickReport {
        let target = self.clock.now().plus(ms);
        self.advance_to(target)
    }

    /// Run every timer due up to `target` in order, moving the clock to each
    /// timer's due time. Crossing a day boundary forces a market refresh.
    pub fn advance_to(&mut self, target: Timestamp) -> TickReport {
        let mut report = TickReport::default();
        loop {
            let boundary = self.clock.next_day_at();
            let stop = match self.events.peek_time() {
                Some(t) => t.min(boundary),
                None => boundary,
            };
            if stop > target {
                break;
            }
            self.clock.set(stop);
            if self.clock.now() >= boundary {
                self.roll_day();
                report.day_rollovers += 1;
            }
            self.run_due(&mut report);
        }
        self.clock.set(target);
        self.run_due(&mut report);
        self.commit();
        report
    }

    fn roll_day(&mut self) {
        let now = self.clock.now();
        info!(day = self.clock.day(), "new game day");
        let year = self.clock.current_year();
        self.market
            .refresh(&mut self.cooldowns, now, true, year, &mut self.rng);
        self.prune_seller_sessions();
    }

    fn run_due(&mut self, report: &mut TickReport) {
        while let Some((due, event)) = self.events.pop_due(self.clock.now()) {
            debug!(due = due.0, ?event, "timer fired");
            match event {
                Event::Wave {
                    listing_id,
                    wave_id,
                } => self.fire_wave(&listing_id, &wave_id, report),
                Event::RepairComplete { job_id } => self.finish_repair(&job_id, report),
            }
        }
    }

    fn fire_wave(&mut self, listing_id: &ListingId, wave_id: &WaveId, report: &mut TickReport) {
        let now = self.clock.now();
        let Some(listing) = self.listings.iter_mut().find(|l| &l.id == listing_id) else {
            debug!(%listing_id, "wave for a closed listing");
            return;
        };
        let Some(run) = waves::execute(listing, wave_id, now, &mut self.rng) else {
            return;
        };
        info!(
            %listing_id,
            buyers = run.buyers.len(),
            total = listing.buyers.len(),
            "buyer wave arrived"
        );
        report.waves += 1;
        report.buyers += run.buyers.len();
        if let Some(extra) = run.follow_up {
            self.events.schedule(
                extra.due_at,
                Event::Wave {
                    listing_id: listing_id.clone(),
                    wave_id: extra.id,
                },
            );
        }
    }

    fn finish_repair(&mut self, job_id: &JobId, report: &mut TickReport) {
        let now = self.clock.now();
        let Some((car_id, cost)) = self.workshop.complete(job_id, now) else {
            return;
        };
        match self.inventory.iter_mut().find(|c| c.id == car_id) {
            Some(car) => apply_repair(car, cost),
            None => warn!(%car_id, "repaired car is no longer in inventory"),
        }
        report.repairs_completed += 1;
        self.pump_workshop();
    }

    /// Start the next repair when the bay is free and cash allows.
    fn pump_workshop(&mut self) {
        let now = self.clock.now();
        let Some(job) = self.workshop.try_start(now, &mut self.cash) else {
            return;
        };
        let due = job.finishes_at().unwrap_or(now);
        let job_id = job.id.clone();
        self.events
            .schedule(due, Event::RepairComplete { job_id });
    }

    fn persist(&mut self) {
        let state = SaveState {
            cash: self.cash,
            inventory: self.inventory.clone(),
            listings: self.listings.clone(),
            repair_jobs: self.workshop.jobs().to_vec(),
            game_epoch: Some(self.clock.epoch()),
        };
        if let Err(e) = save_state(&mut self.store, &state) {
            warn!(error = %e, "failed to save game");
        }
    }

    /// Cash may have changed: try the workshop, then save.
    fn commit(&mut self) {
        self.pump_workshop();
        self.persist();
    }

    /// Run timers that are already due (zero-delay waves), then commit.
    fn settle(&mut self) {
        let mut report = TickReport::default();
        self.run_due(&mut report);
        self.commit();
    }

    fn ensure_funds(&self, needed: Decimal) -> Result<(), EngineError> {
        if needed > self.cash {
            return Err(EngineError::InsufficientFunds {
                needed,
                available: self.cash,
            });
        }
        Ok(())
    }

    fn prune_seller_sessions(&mut self) {
        let market = &self.market;
        self.sessions.retain(|key, _| match key {
            SessionKey::Seller(car_id) => market.car(car_id).is_some(),
            SessionKey::Buyer(..) => true,
        });
    }

    // ----- market -----

    /// Refresh the market unless the refresh cooldown is running.
    pub fn refresh_market(&mut self, force: bool) -> Result<(), EngineError> {
        let now = self.clock.now();
        let year = self.clock.current_year();
        if !self
            .market
            .refresh(&mut self.cooldowns, now, force, year, &mut self.rng)
        {
            return Err(EngineError::CooldownActive {
                remaining_ms: self.cooldowns.remaining(&CooldownKind::MarketRefresh, now),
            });
        }
        self.prune_seller_sessions();
        Ok(())
    }

    /// Pay for a pre-purchase inspection of a market car. Inspecting the same
    /// car twice is free.
    pub fn inspect_car(&mut self, car_id: &CarId) -> Result<InspectionReport, EngineError> {
        let car = self
            .market
            .car(car_id)
            .ok_or_else(|| EngineError::stale("market car", car_id))?;
        let cost = if car.inspected {
            Decimal::ZERO
        } else {
            inspection_cost(car.estimated_repair_cost)
        };
        self.ensure_funds(cost)?;
        let car = self
            .market
            .car_mut(car_id)
            .ok_or_else(|| EngineError::stale("market car", car_id))?;
        car.inspected = true;
        let report = InspectionReport {
            car_id: car.id.clone(),
            cost,
            damages: car.damages.clone(),
            estimated_repair_cost: car.estimated_repair_cost,
        };
        self.cash -= cost;
        info!(%car_id, %cost, damages = report.damages.len(), "car inspected");
        self.commit();
        Ok(report)
    }

    /// Buy a market car at `price`.
    pub fn purchase_car(&mut self, car_id: &CarId, price: Decimal) -> Result<Car, EngineError> {
        ensure_positive(price, "price")?;
        let car = self.buy(car_id, price)?;
        self.commit();
        Ok(car)
    }

    fn buy(&mut self, car_id: &CarId, price: Decimal) -> Result<Car, EngineError> {
        if self.market.car(car_id).is_none() {
            return Err(EngineError::stale("market car", car_id));
        }
        self.ensure_funds(price)?;
        let mut car = self
            .market
            .take(car_id)
            .ok_or_else(|| EngineError::stale("market car", car_id))?;
        car.status = CarStatus::Owned;
        car.purchase_price = Some(price);
        self.cash -= price;
        self.sessions.remove(&SessionKey::Seller(car_id.clone()));
        self.stats.cars_bought += 1;
        self.stats.purchases += price;
        info!(%car_id, %price, cash = %self.cash, "car purchased");
        self.inventory.insert(0, car.clone());
        Ok(car)
    }

    fn open_seller_session(&mut self, car_id: &CarId) -> Result<SessionKey, EngineError> {
        let key = SessionKey::Seller(car_id.clone());
        if !self.sessions.contains_key(&key) {
            let car = self
                .market
                .car(car_id)
                .ok_or_else(|| EngineError::stale("market car", car_id))?;
            let session = Negotiation::buy(car, &mut self.rng);
            self.sessions.insert(key.clone(), session);
        }
        Ok(key)
    }

    fn seller_walked(&mut self, car_id: &CarId, key: &SessionKey) {
        self.sessions.remove(key);
        self.market.take(car_id);
        info!(%car_id, "seller walked; car left the market");
    }

    /// Offer `price` to a market car's seller.
    pub fn counter_seller(
        &mut self,
        car_id: &CarId,
        price: Decimal,
    ) -> Result<Outcome, EngineError> {
        ensure_positive(price, "offer")?;
        if self.market.car(car_id).is_none() {
            return Err(EngineError::stale("market car", car_id));
        }
        self.ensure_funds(price)?;
        let key = self.open_seller_session(car_id)?;
        let session = self
            .sessions
            .get_mut(&key)
            .ok_or_else(|| EngineError::stale("negotiation", car_id))?;
        let outcome = session.counter(price, &mut self.rng)?;
        debug!(%car_id, %price, ?outcome, "countered seller");
        match outcome {
            Outcome::Deal { price } => {
                self.buy(car_id, price)?;
            }
            Outcome::Walked { .. } => self.seller_walked(car_id, &key),
            Outcome::Countered { .. } | Outcome::Declined => {}
        }
        self.commit();
        Ok(outcome)
    }

    /// Buy at the seller's standing counter, or at asking if there is none.
    pub fn accept_seller(&mut self, car_id: &CarId) -> Result<Car, EngineError> {
        let key = SessionKey::Seller(car_id.clone());
        let asking = self
            .market
            .car(car_id)
            .ok_or_else(|| EngineError::stale("market car", car_id))?
            .asking;
        let price = self
            .sessions
            .get(&key)
            .map(|s| s.reference_price())
            .unwrap_or(asking);
        self.ensure_funds(price)?;
        if let Some(session) = self.sessions.get_mut(&key) {
            session.accept()?;
        }
        let car = self.buy(car_id, price)?;
        self.commit();
        Ok(car)
    }

    /// Pass on the seller's counter. Costs a round of patience.
    pub fn decline_seller(&mut self, car_id: &CarId) -> Result<Outcome, EngineError> {
        let key = self.open_seller_session(car_id)?;
        let session = self
            .sessions
            .get_mut(&key)
            .ok_or_else(|| EngineError::stale("negotiation", car_id))?;
        let outcome = session.decline()?;
        if matches!(outcome, Outcome::Walked { .. }) {
            self.seller_walked(car_id, &key);
        }
        self.commit();
        Ok(outcome)
    }

    // ----- listings -----

    fn listing_mut(&mut self, id: &ListingId) -> Result<&mut Listing, EngineError> {
        self.listings
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(|| EngineError::stale("listing", id))
    }

    fn arm_waves(&mut self, listing_id: &ListingId, entries: Vec<ScheduledWave>) {
        for entry in entries {
            self.events.schedule(
                entry.due_at,
                Event::Wave {
                    listing_id: listing_id.clone(),
                    wave_id: entry.id,
                },
            );
        }
    }

    /// Put an inventory car up for sale. Buyer waves are scheduled from the
    /// price; a wave due right away arrives before this returns.
    pub fn create_listing(
        &mut self,
        car_id: &CarId,
        list_price: Decimal,
    ) -> Result<ListingId, EngineError> {
        ensure_positive(list_price, "list price")?;
        let idx = self
            .inventory
            .iter()
            .position(|c| &c.id == car_id)
            .ok_or_else(|| EngineError::stale("inventory car", car_id))?;
        if self.workshop.pending_for(car_id).is_some() {
            return Err(EngineError::InWorkshop(car_id.clone()));
        }
        let now = self.clock.now();
        let car = self.inventory.remove(idx);
        let mut listing = Listing {
            id: ListingId(uid("l", &mut self.rng)),
            car,
            list_price,
            created_at: now,
            waves: 0,
            buyers: Vec::new(),
            wave_schedule: Vec::new(),
        };
        let entries = waves::schedule(&mut listing, now, &mut self.rng);
        let id = listing.id.clone();
        info!(
            listing_id = %id,
            %car_id,
            %list_price,
            waves = entries.len(),
            "listing created"
        );
        self.listings.push(listing);
        self.arm_waves(&id, entries);
        self.settle();
        Ok(id)
    }

    /// Change a listing's price. Pending waves are replaced by a plan for the
    /// new price. Limited by the price update cooldown.
    pub fn update_listing_price(
        &mut self,
        listing_id: &ListingId,
        price: Decimal,
    ) -> Result<(), EngineError> {
        ensure_positive(price, "list price")?;
        let now = self.clock.now();
        let kind = CooldownKind::PriceUpdate(listing_id.clone());
        if self.listing(listing_id).is_none() {
            return Err(EngineError::stale("listing", listing_id));
        }
        let remaining = self.cooldowns.remaining(&kind, now);
        if remaining > 0 {
            debug!(%listing_id, remaining_ms = remaining, "price update on cooldown");
            return Err(EngineError::CooldownActive {
                remaining_ms: remaining,
            });
        }
        self.events
            .cancel_owner(&EventOwner::Listing(listing_id.clone()));
        let listing = self
            .listings
            .iter_mut()
            .find(|l| &l.id == listing_id)
            .ok_or_else(|| EngineError::stale("listing", listing_id))?;
        listing.list_price = price;
        let entries = waves::schedule(listing, now, &mut self.rng);
        info!(%listing_id, %price, waves = entries.len(), "listing re-priced");
        self.arm_waves(listing_id, entries);
        self.cooldowns.mark(kind, now);
        self.settle();
        Ok(())
    }

    /// Take a listing down; the car goes back to inventory.
    pub fn remove_listing(&mut self, listing_id: &ListingId) -> Result<CarId, EngineError> {
        let listing = self.take_listing(listing_id)?;
        let car_id = listing.car.id.clone();
        info!(%listing_id, %car_id, "listing removed");
        self.inventory.insert(0, listing.car);
        self.commit();
        Ok(car_id)
    }

    /// Detach a listing with its timers, cooldown and negotiations.
    fn take_listing(&mut self, listing_id: &ListingId) -> Result<Listing, EngineError> {
        let idx = self
            .listings
            .iter()
            .position(|l| &l.id == listing_id)
            .ok_or_else(|| EngineError::stale("listing", listing_id))?;
        let listing = self.listings.remove(idx);
        self.events
            .cancel_owner(&EventOwner::Listing(listing_id.clone()));
        self.cooldowns
            .clear(&CooldownKind::PriceUpdate(listing_id.clone()));
        self.sessions
            .retain(|key, _| !matches!(key, SessionKey::Buyer(l, _) if l == listing_id));
        Ok(listing)
    }

    fn close_sale(&mut self, listing_id: &ListingId, price: Decimal) -> Result<Sale, EngineError> {
        let listing = self.take_listing(listing_id)?;
        let spent = listing.car.total_spent();
        let gain = profit(price, spent);
        self.cash += price;
        self.stats.cars_sold += 1;
        self.stats.revenue += price;
        self.stats.realized_profit += gain;
        info!(%listing_id, car = %listing.car.title(), %price, profit = %gain, "car sold");
        Ok(Sale {
            listing_id: listing_id.clone(),
            car: listing.car,
            price,
            profit: gain,
            profit_pct: profit_pct(gain, spent),
        })
    }

    fn open_buyer_session(
        &mut self,
        listing_id: &ListingId,
        buyer_id: &BuyerId,
    ) -> Result<SessionKey, EngineError> {
        let key = SessionKey::Buyer(listing_id.clone(), buyer_id.clone());
        if !self.sessions.contains_key(&key) {
            let listing = self
                .listing(listing_id)
                .ok_or_else(|| EngineError::stale("listing", listing_id))?;
            let buyer = listing
                .buyer(buyer_id)
                .ok_or_else(|| EngineError::stale("buyer", buyer_id))?;
            let session = Negotiation::sell(listing_id, buyer);
            self.sessions.insert(key.clone(), session);
        }
        Ok(key)
    }

    fn drop_buyer(&mut self, listing_id: &ListingId, buyer_id: &BuyerId) -> bool {
        self.sessions
            .remove(&SessionKey::Buyer(listing_id.clone(), buyer_id.clone()));
        match self.listings.iter_mut().find(|l| &l.id == listing_id) {
            Some(listing) => {
                let before = listing.buyers.len();
                listing.buyers.retain(|b| &b.id != buyer_id);
                listing.buyers.len() != before
            }
            None => false,
        }
    }

    /// Sell to a buyer at their current offer.
    pub fn accept_offer(
        &mut self,
        listing_id: &ListingId,
        buyer_id: &BuyerId,
    ) -> Result<Sale, EngineError> {
        let key = SessionKey::Buyer(listing_id.clone(), buyer_id.clone());
        let offer = self
            .listing(listing_id)
            .ok_or_else(|| EngineError::stale("listing", listing_id))?
            .buyer(buyer_id)
            .ok_or_else(|| EngineError::stale("buyer", buyer_id))?
            .offer;
        let price = match self.sessions.get_mut(&key) {
            Some(session) => match session.accept()? {
                Outcome::Deal { price } => price,
                _ => offer,
            },
            None => offer,
        };
        ensure_positive(price, "offer")?;
        let sale = self.close_sale(listing_id, price)?;
        self.commit();
        Ok(sale)
    }

    /// Ask a buyer for `price`. A rejected ask makes the buyer raise their
    /// offer, which is stored on the listing.
    pub fn counter_offer(
        &mut self,
        listing_id: &ListingId,
        buyer_id: &BuyerId,
        price: Decimal,
    ) -> Result<Outcome, EngineError> {
        ensure_positive(price, "price")?;
        let key = self.open_buyer_session(listing_id, buyer_id)?;
        let session = self
            .sessions
            .get_mut(&key)
            .ok_or_else(|| EngineError::stale("negotiation", buyer_id))?;
        let outcome = session.counter(price, &mut self.rng)?;
        let patience = session.patience();
        debug!(%listing_id, %buyer_id, %price, ?outcome, "countered buyer");
        match outcome {
            Outcome::Deal { price } => {
                self.close_sale(listing_id, price)?;
            }
            Outcome::Walked { reason } => {
                self.drop_buyer(listing_id, buyer_id);
                info!(%listing_id, %buyer_id, ?reason, "buyer walked");
            }
            Outcome::Countered { price: raised } => {
                let listing = self.listing_mut(listing_id)?;
                if let Some(buyer) = listing.buyer_mut(buyer_id) {
                    buyer.offer = raised;
                    buyer.patience = patience;
                }
            }
            Outcome::Declined => {}
        }
        self.commit();
        Ok(outcome)
    }

    /// Turn down a buyer's offer without asking for a price.
    pub fn decline_buyer(
        &mut self,
        listing_id: &ListingId,
        buyer_id: &BuyerId,
    ) -> Result<Outcome, EngineError> {
        let key = self.open_buyer_session(listing_id, buyer_id)?;
        let session = self
            .sessions
            .get_mut(&key)
            .ok_or_else(|| EngineError::stale("negotiation", buyer_id))?;
        let outcome = session.decline()?;
        let patience = session.patience();
        if matches!(outcome, Outcome::Walked { .. }) {
            self.drop_buyer(listing_id, buyer_id);
            info!(%listing_id, %buyer_id, "buyer lost patience");
        } else if let Some(buyer) = self.listing_mut(listing_id)?.buyer_mut(buyer_id) {
            buyer.patience = patience;
        }
        self.commit();
        Ok(outcome)
    }

    /// Dismiss a buyer from a listing.
    pub fn remove_buyer(
        &mut self,
        listing_id: &ListingId,
        buyer_id: &BuyerId,
    ) -> Result<(), EngineError> {
        if self.listing(listing_id).is_none() {
            return Err(EngineError::stale("listing", listing_id));
        }
        if !self.drop_buyer(listing_id, buyer_id) {
            return Err(EngineError::stale("buyer", buyer_id));
        }
        self.commit();
        Ok(())
    }

    /// Suggested list price for an inventory car at `margin_pct` over its
    /// estimated resale.
    pub fn suggested_price(
        &self,
        car_id: &CarId,
        margin_pct: f64,
    ) -> Result<Decimal, EngineError> {
        let car = self
            .inventory
            .iter()
            .find(|c| &c.id == car_id)
            .ok_or_else(|| EngineError::stale("inventory car", car_id))?;
        suggested_list_price(car.valuation_anchor(), margin_pct)
            .map_err(|e| EngineError::InvalidInput(e.to_string()))
    }

    // ----- workshop -----

    /// Workshop quote for an inventory car.
    pub fn repair_quote(&self, car_id: &CarId) -> Result<Decimal, EngineError> {
        let car = self
            .inventory
            .iter()
            .find(|c| &c.id == car_id)
            .ok_or_else(|| EngineError::stale("inventory car", car_id))?;
        Ok(repair_quote(
            car.estimated_repair_cost,
            self.config.repair_min_cost,
        ))
    }

    /// Queue an inventory car for repair at `cost`. The job starts, and is
    /// paid for, once the bay is free and cash covers it.
    pub fn send_to_workshop(
        &mut self,
        car_id: &CarId,
        cost: Decimal,
    ) -> Result<JobId, EngineError> {
        ensure_positive(cost, "repair cost")?;
        if !self.inventory.iter().any(|c| &c.id == car_id) {
            return Err(EngineError::stale("inventory car", car_id));
        }
        if self.workshop.pending_for(car_id).is_some() {
            return Err(EngineError::InWorkshop(car_id.clone()));
        }
        let id = JobId(uid("job", &mut self.rng));
        let now = self.clock.now();
        self.workshop
            .create_job(id.clone(), car_id.clone(), cost, now);
        self.commit();
        Ok(id)
    }

    pub fn cancel_repair_job(&mut self, job_id: &JobId) -> Result<(), EngineError> {
        self.workshop.cancel(job_id)?;
        self.events.cancel_owner(&EventOwner::Job(job_id.clone()));
        self.commit();
        Ok(())
    }
}
