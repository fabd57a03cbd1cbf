//! Report job domain entities.

pub mod model;
pub mod request;
pub mod status;

pub use model::JobRecord;
pub use request::{JobRequest, Language, ReportFormat, ReportType};
pub use status::{JobPriority, JobStatus};
