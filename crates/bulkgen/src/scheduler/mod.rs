//! Concurrency, retry and cancellation policy for one bulk job.

pub mod config;
pub mod retry;
pub mod runner;

pub use config::SchedulerConfig;
pub use retry::RetryPolicy;
pub use runner::{BulkJobScheduler, CANCELLED_REASON};
