//! Errors raised while generating a report.

use reporthub_core::error::AppError;

/// Failure reported by the dispatcher or a report producer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReportError {
    /// No producer is registered for the report type.
    #[error("Unknown report type: {0}")]
    ReportTypeUnknown(String),

    /// The request parameters cannot be used by the producer.
    #[error("Invalid report parameters: {0}")]
    InvalidParameters(String),

    /// The body cannot be rendered in the requested format.
    #[error("Unsupported report format: {0}")]
    UnsupportedFormat(String),

    /// A data source failed.
    #[error("Failed to fetch report data: {0}")]
    DataFetchFailed(String),

    /// Any other transient failure inside the producer.
    #[error("Report generation failed: {0}")]
    Internal(String),

    /// The job was cancelled while the producer was running.
    #[error("Report generation cancelled")]
    Cancelled,
}

impl ReportError {
    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DataFetchFailed(_) | Self::Internal(_))
    }
}

/// Outcome of a failed execution attempt, as seen by the retry controller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobExecutionError {
    /// Permanent failure, do not retry.
    #[error("{0}")]
    Permanent(String),

    /// Transient failure, may retry.
    #[error("{0}")]
    Transient(String),

    /// The attempt stopped because its cancellation token fired.
    #[error("Job cancelled")]
    Cancelled,
}

impl JobExecutionError {
    /// Whether the failure is eligible for another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<ReportError> for JobExecutionError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::Cancelled => Self::Cancelled,
            e if e.is_retryable() => Self::Transient(e.to_string()),
            e => Self::Permanent(e.to_string()),
        }
    }
}

impl From<AppError> for JobExecutionError {
    fn from(err: AppError) -> Self {
        if err.is_validation() {
            Self::Permanent(err.message)
        } else {
            Self::Transient(err.to_string())
        }
    }
}
