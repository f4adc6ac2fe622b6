use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{RateLimiter, UpdateJob};
use crate::store::DocumentStore;

/// Default number of jobs in flight.
pub const DEFAULT_WORKERS: usize = 4;

/// Success/failure counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub ok: usize,
    pub fail: usize,
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub record_id: String,
    pub symbol: String,
    pub success: bool,
    /// Time spent on the request itself, excluding the limiter wait.
    pub elapsed: Duration,
}

/// Runs update jobs concurrently, each request gated by the shared limiter.
///
/// Every job is attempted exactly once; a failed job never cancels its
/// siblings. Transient statuses are retried inside the HTTP client, not here.
pub struct Dispatcher {
    store: Arc<dyn DocumentStore>,
    limiter: Arc<RateLimiter>,
    workers: usize,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn DocumentStore>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            store,
            limiter,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub async fn dispatch(&self, jobs: Vec<UpdateJob>) -> DispatchSummary {
        self.dispatch_with_outcomes(jobs).await.0
    }

    /// Like [`Self::dispatch`] but also returns each job's outcome, in completion order.
    pub async fn dispatch_with_outcomes(
        &self,
        jobs: Vec<UpdateJob>,
    ) -> (DispatchSummary, Vec<JobOutcome>) {
        if jobs.is_empty() {
            return (DispatchSummary::default(), Vec::new());
        }

        let total = jobs.len();
        let outcomes: Vec<JobOutcome> = stream::iter(jobs)
            .map(|job| self.execute(job))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let ok = outcomes.iter().filter(|o| o.success).count();
        let summary = DispatchSummary { ok, fail: total - ok };
        info!(ok = summary.ok, fail = summary.fail, "update batch finished");
        (summary, outcomes)
    }

    async fn execute(&self, job: UpdateJob) -> JobOutcome {
        self.limiter.wait_for_slot().await;

        let started = Instant::now();
        let result = self.store.patch(&job.url, &job.payload).await;
        let elapsed = started.elapsed();

        let success = match result {
            Ok(()) => {
                debug!(
                    symbol = %job.symbol,
                    record_id = %job.record_id,
                    price = job.price,
                    "price updated"
                );
                true
            }
            Err(err) => {
                warn!(
                    symbol = %job.symbol,
                    record_id = %job.record_id,
                    error = %err,
                    "price update failed"
                );
                false
            }
        };

        JobOutcome {
            record_id: job.record_id,
            symbol: job.symbol,
            success,
            elapsed,
        }
    }
}
