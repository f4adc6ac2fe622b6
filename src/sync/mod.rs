//! Pushing fresh prices into tracked records.
//!
//! Records are read, turned into independent [`UpdateJob`]s, and executed by
//! the [`Dispatcher`] under a shared [`RateLimiter`]. Individual failures are
//! counted, never propagated.

pub mod aggregate;
mod dispatcher;
mod jobs;
mod rate_limiter;
mod service;

pub use dispatcher::{DispatchSummary, Dispatcher, JobOutcome, DEFAULT_WORKERS};
pub use jobs::{unique_symbols, AssetKind, MissingPricePolicy, UpdateJob, UpdateJobBuilder};
pub use rate_limiter::RateLimiter;
pub use service::{PriceSync, RunReport, StepReport, StockSchedule};
