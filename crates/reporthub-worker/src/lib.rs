//! Report job scheduling and execution for ReportHub.
//!
//! This crate provides:
//! - A report scheduler that queues, claims and executes report jobs under a
//!   bounded concurrency budget, with retry, backoff and cancellation
//! - A dispatcher that routes jobs to producers registered per report type
//! - A cron front-end that enqueues recurring reports
//! - The built-in `custom` report producer

pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod pool;
pub mod producers;
pub mod progress;
pub mod queue;
pub mod recurring;
pub mod retry;
mod runner;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{ReportDispatcher, ReportProducer};
pub use error::{JobExecutionError, ReportError};
pub use progress::ProgressReporter;
pub use recurring::RecurringReports;
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{JobFilter, QueueStats, ReportScheduler};
