//! Single-bay repair workshop.
//!
//! Jobs run one at a time in creation order. The head of the queue starts as
//! soon as the bay is free and the player can pay for it; a job that cannot
//! be paid for waits at the head of the queue.

use dealer_core::{Car, CarId, JobId, RepairJob, RepairStatus, Timestamp};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::EngineError;

const MS_PER_DOLLAR: u64 = 20;
const MIN_DURATION_MS: u64 = 5_000;
const MAX_DURATION_MS: u64 = 120_000;

/// Bay time for a job of `cost` dollars.
pub fn repair_duration_ms(cost: Decimal) -> u64 {
    cost.round()
        .to_u64()
        .unwrap_or(0)
        .saturating_mul(MS_PER_DOLLAR)
        .clamp(MIN_DURATION_MS, MAX_DURATION_MS)
}

/// Apply a finished repair to the car.
pub fn apply_repair(car: &mut Car, cost: Decimal) {
    car.damages.clear();
    car.condition = (car.condition + 1).min(5);
    car.estimated_resale += car.estimated_repair_cost;
    car.estimated_repair_cost = Decimal::ZERO;
    car.repair_spent += cost;
}

#[derive(Clone, Debug, Default)]
pub struct RepairShop {
    jobs: Vec<RepairJob>,
}

impl RepairShop {
    pub fn new(jobs: Vec<RepairJob>) -> Self {
        Self { jobs }
    }

    pub fn jobs(&self) -> &[RepairJob] {
        &self.jobs
    }

    pub fn job(&self, id: &JobId) -> Option<&RepairJob> {
        self.jobs.iter().find(|j| &j.id == id)
    }

    pub fn in_progress(&self) -> Option<&RepairJob> {
        self.jobs
            .iter()
            .find(|j| j.status == RepairStatus::InProgress)
    }

    /// Queued or in-progress job for `car_id`.
    pub fn pending_for(&self, car_id: &CarId) -> Option<&RepairJob> {
        self.jobs
            .iter()
            .find(|j| &j.car_id == car_id && j.status.is_pending())
    }

    pub fn queued(&self) -> impl Iterator<Item = &RepairJob> {
        self.jobs.iter().filter(|j| j.status == RepairStatus::Queued)
    }

    pub fn create_job(
        &mut self,
        id: JobId,
        car_id: CarId,
        cost: Decimal,
        now: Timestamp,
    ) -> &RepairJob {
        let job = RepairJob {
            id,
            car_id,
            cost,
            status: RepairStatus::Queued,
            created_at: now,
            start_at: None,
            duration_ms: repair_duration_ms(cost),
            completed_at: None,
        };
        info!(
            job_id = %job.id,
            car_id = %job.car_id,
            cost = %job.cost,
            duration_ms = job.duration_ms,
            "repair job queued"
        );
        self.jobs.push(job);
        &self.jobs[self.jobs.len() - 1]
    }

    /// Start the head of the queue if the bay is free and `cash` covers it.
    /// The cost is taken from `cash`. Returns the started job.
    pub fn try_start(&mut self, now: Timestamp, cash: &mut Decimal) -> Option<&RepairJob> {
        if self.in_progress().is_some() {
            return None;
        }
        let idx = self
            .jobs
            .iter()
            .position(|j| j.status == RepairStatus::Queued)?;
        let job = &mut self.jobs[idx];
        if job.cost > *cash {
            debug!(job_id = %job.id, cost = %job.cost, cash = %cash, "repair waiting for funds");
            return None;
        }
        *cash -= job.cost;
        job.status = RepairStatus::InProgress;
        job.start_at = Some(now);
        info!(job_id = %job.id, car_id = %job.car_id, "repair started");
        Some(&self.jobs[idx])
    }

    /// Finish an in-progress job. Returns the repaired car and the job cost.
    pub fn complete(&mut self, id: &JobId, now: Timestamp) -> Option<(CarId, Decimal)> {
        let job = self
            .jobs
            .iter_mut()
            .find(|j| &j.id == id && j.status == RepairStatus::InProgress)?;
        job.status = RepairStatus::Done;
        job.completed_at = Some(now);
        info!(job_id = %job.id, car_id = %job.car_id, "repair done");
        Some((job.car_id.clone(), job.cost))
    }

    /// Cancel a queued job. In-progress and finished jobs cannot be cancelled.
    pub fn cancel(&mut self, id: &JobId) -> Result<(), EngineError> {
        let job = self
            .jobs
            .iter_mut()
            .find(|j| &j.id == id)
            .ok_or_else(|| EngineError::stale("repair job", id))?;
        if job.status != RepairStatus::Queued {
            return Err(EngineError::InvalidInput(format!(
                "only queued jobs can be cancelled, {} is {:?}",
                job.id, job.status
            )));
        }
        job.status = RepairStatus::Cancelled;
        info!(job_id = %job.id, "repair cancelled");
        Ok(())
    }

    /// Demote all but the first in-progress job back to the queue. Saves
    /// written by older builds could hold several.
    pub fn enforce_single_bay(&mut self) -> usize {
        let mut seen = false;
        let mut demoted = 0;
        for job in self
            .jobs
            .iter_mut()
            .filter(|j| j.status == RepairStatus::InProgress)
        {
            if seen {
                job.status = RepairStatus::Queued;
                job.start_at = None;
                demoted += 1;
            }
            seen = true;
        }
        demoted
    }
}
