//! Progress reporting handle given to report producers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use reporthub_core::types::id::JobId;

use crate::error::{JobExecutionError, ReportError};
use crate::scheduler::SchedulerCore;

/// Lowest percentage a producer can report.
pub const PRODUCER_MIN_PROGRESS: u8 = 11;
/// Highest percentage a producer can report.
pub const PRODUCER_MAX_PROGRESS: u8 = 69;

/// Lets a producer persist intermediate progress and notice cancellation.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    job_id: JobId,
    token: CancellationToken,
    core: Option<Arc<SchedulerCore>>,
}

impl ProgressReporter {
    pub(crate) fn new(job_id: JobId, token: CancellationToken, core: Arc<SchedulerCore>) -> Self {
        Self {
            job_id,
            token,
            core: Some(core),
        }
    }

    /// A reporter that persists nothing and is never cancelled. Useful for
    /// running a producer outside the scheduler.
    pub fn detached(job_id: JobId) -> Self {
        Self {
            job_id,
            token: CancellationToken::new(),
            core: None,
        }
    }

    /// Job the progress belongs to.
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Whether the job has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Persist a milestone. `percent` is clamped into the producer band.
    ///
    /// Returns [`ReportError::Cancelled`] once the job has been cancelled;
    /// producers should stop and propagate it.
    pub async fn report(&self, percent: u8, message: &str) -> Result<(), ReportError> {
        if self.token.is_cancelled() {
            return Err(ReportError::Cancelled);
        }
        let Some(core) = &self.core else {
            return Ok(());
        };
        let percent = percent.clamp(PRODUCER_MIN_PROGRESS, PRODUCER_MAX_PROGRESS);
        core.checkpoint(self.job_id, &self.token, percent, message)
            .await
            .map_err(|e| match e {
                JobExecutionError::Cancelled => ReportError::Cancelled,
                other => ReportError::Internal(other.to_string()),
            })
    }
}
