//! Discrete-event queue for timers.
//!
//! Events come out in `(due, insertion)` order. Each event belongs to an
//! owner (a listing or a repair job) so every timer of that owner can be
//! cancelled at once; cancelled entries are dropped lazily when they reach
//! the top of the heap.

use dealer_core::{JobId, ListingId, Timestamp, WaveId};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// A timer payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Wave {
        listing_id: ListingId,
        wave_id: WaveId,
    },
    RepairComplete {
        job_id: JobId,
    },
}

/// Who a timer belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventOwner {
    Listing(ListingId),
    Job(JobId),
}

impl Event {
    pub fn owner(&self) -> EventOwner {
        match self {
            Event::Wave { listing_id, .. } => EventOwner::Listing(listing_id.clone()),
            Event::RepairComplete { job_id } => EventOwner::Job(job_id.clone()),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<(Timestamp, u64)>>,
    pending: HashMap<u64, Event>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Timestamp, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse((due, seq)));
        self.pending.insert(seq, event);
    }

    /// Drop every pending timer of `owner`. Returns how many were cancelled.
    pub fn cancel_owner(&mut self, owner: &EventOwner) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, e| &e.owner() != owner);
        before - self.pending.len()
    }

    /// Due time of the next live event.
    pub fn peek_time(&mut self) -> Option<Timestamp> {
        self.discard_cancelled();
        self.heap.peek().map(|Reverse((due, _))| *due)
    }

    /// Pop the next event due at or before `now`.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<(Timestamp, Event)> {
        self.discard_cancelled();
        let Reverse((due, _)) = *self.heap.peek()?;
        if due > now {
            return None;
        }
        let Reverse((due, seq)) = self.heap.pop()?;
        self.pending.remove(&seq).map(|e| (due, e))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse((_, seq))) = self.heap.peek() {
            if self.pending.contains_key(seq) {
                break;
            }
            self.heap.pop();
        }
    }
}
