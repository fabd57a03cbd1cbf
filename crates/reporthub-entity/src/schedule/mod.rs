//! Recurring report schedule entities.

pub mod model;

pub use model::{ReportSchedule, ScheduleFrequency};
