//! Shared request pacing for dispatcher workers.
//!
//! The limiter keeps a single "next allowed" timestamp. Each caller reserves
//! its slot under a mutex (read the timestamp, compute its wait, advance the
//! timestamp by one interval) and then sleeps outside the lock. Reservations
//! are serialized, so two racing callers can never both be told "go now"
//! when only one slot is free.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::time::Instant;
use tracing::debug;

use crate::config::{RateLimitConfig, MIN_REQUESTS_PER_SECOND};

#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum spacing between granted slots (1 / rps).
    interval: Duration,
    /// How far ahead of `next_allowed_at` a caller may go: (burst - 1) intervals.
    burst_allowance: Duration,
    next_allowed_at: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(rps_limit: f64, burst: u32) -> Result<Self> {
        if !(rps_limit.is_finite() && rps_limit >= MIN_REQUESTS_PER_SECOND) {
            bail!("rate limit must be at least one request per day, got {rps_limit} per second");
        }
        if burst == 0 {
            bail!("rate limiter burst must be at least 1");
        }

        let interval = match Duration::try_from_secs_f64(1.0 / rps_limit) {
            Ok(interval) => interval,
            Err(err) => bail!("rate limit of {rps_limit} per second has no usable interval: {err}"),
        };
        Ok(Self {
            interval,
            burst_allowance: interval.saturating_mul(burst - 1),
            next_allowed_at: Mutex::new(None),
        })
    }

    pub fn from_config(config: &RateLimitConfig) -> Result<Self> {
        Self::new(config.requests_per_second, config.burst)
    }

    /// Wait until one request may be issued. Returns how long the caller slept.
    pub async fn wait_for_slot(&self) -> Duration {
        let wait = self.reserve(Instant::now());
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "rate limiter: waiting for slot");
            tokio::time::sleep(wait).await;
        }
        wait
    }

    /// Claim the next slot at `now` and return the wait before using it.
    fn reserve(&self, now: Instant) -> Duration {
        let mut next = self.lock_state();

        // An idle limiter restarts from `now`, which caps the accumulated burst.
        let theoretical = next.map_or(now, |at| at.max(now));
        let wait = match theoretical.checked_sub(self.burst_allowance) {
            Some(earliest) => earliest.saturating_duration_since(now),
            None => Duration::ZERO,
        };

        *next = Some(theoretical + self.interval);
        wait
    }

    /// Recover from poison: the state is a single timestamp, always valid.
    fn lock_state(&self) -> MutexGuard<'_, Option<Instant>> {
        self.next_allowed_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
