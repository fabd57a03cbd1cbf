//! Job record model and its state transitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use reporthub_core::error::AppError;
use reporthub_core::types::id::JobId;

use super::request::JobRequest;
use super::status::JobStatus;

/// Metadata key carrying the latest checkpoint message.
pub const PROGRESS_MESSAGE_KEY: &str = "progressMessage";

/// Metadata key carrying the failure that triggered the latest retry.
pub const LAST_ERROR_KEY: &str = "lastError";

/// A report job and its lifecycle state.
///
/// Records are only mutated through the transition methods below, which
/// reject any edge the state machine does not define.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique job identifier.
    pub id: JobId,
    /// The originating request, with `id` mirrored in.
    pub request: JobRequest,
    /// Current job status.
    pub status: JobStatus,
    /// Progress percentage within the current attempt.
    pub progress: u8,
    /// When the current (or last) attempt was claimed.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job completed or failed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure message, only set once the job has failed.
    pub error: Option<String>,
    /// URL of the rendered artifact, only set once completed.
    pub result_url: Option<String>,
    /// Number of retries consumed so far.
    pub retry_count: u32,
    /// Retry budget.
    pub max_retries: u32,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
    /// When the record was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a fresh `queued` record for `request`.
    pub fn new(id: JobId, mut request: JobRequest, default_max_retries: u32, now: DateTime<Utc>) -> Self {
        request.id = Some(id);
        let max_retries = request.max_retries.unwrap_or(default_max_retries);
        Self {
            id,
            request,
            status: JobStatus::Queued,
            progress: 0,
            started_at: None,
            completed_at: None,
            error: None,
            result_url: None,
            retry_count: 0,
            max_retries,
            created_at: now,
            updated_at: now,
        }
    }

    /// Not-before time of the job, if any.
    pub fn eligible_at(&self) -> Option<DateTime<Utc>> {
        self.request.scheduled_at
    }

    /// Whether a queued job may be claimed at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Queued && self.eligible_at().is_none_or(|at| at <= now)
    }

    /// Whether another retry is still within budget.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Time between claim and completion of a completed job.
    pub fn processing_time(&self) -> Option<Duration> {
        match (self.status, self.started_at, self.completed_at) {
            (JobStatus::Completed, Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// `queued -> processing`.
    pub fn mark_processing(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition(JobStatus::Processing, now)?;
        self.started_at = Some(now);
        self.completed_at = None;
        self.progress = 0;
        Ok(())
    }

    /// Record a checkpoint of a processing job.
    ///
    /// Progress is clamped to 100 and never moves backwards within an
    /// attempt. Returns `false` when the job is not processing.
    pub fn record_progress(&mut self, percent: u8, message: Option<&str>, now: DateTime<Utc>) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        self.progress = self.progress.max(percent.min(100));
        if let Some(message) = message {
            self.request
                .set_metadata(PROGRESS_MESSAGE_KEY, Value::String(message.to_string()));
        }
        self.updated_at = now;
        true
    }

    /// `processing -> completed`.
    pub fn mark_completed(&mut self, result_url: String, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition(JobStatus::Completed, now)?;
        self.progress = 100;
        self.completed_at = Some(now);
        self.result_url = Some(result_url);
        self.error = None;
        Ok(())
    }

    /// `processing -> queued` after a retryable failure.
    ///
    /// Consumes one retry and gates the next attempt behind `not_before`.
    pub fn requeue_for_retry(
        &mut self,
        not_before: DateTime<Utc>,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if !self.can_retry() {
            return Err(AppError::conflict(format!(
                "Job {} has exhausted its {} retries",
                self.id, self.max_retries
            )));
        }
        self.transition(JobStatus::Queued, now)?;
        self.retry_count += 1;
        self.request.scheduled_at = Some(not_before);
        self.request
            .set_metadata(LAST_ERROR_KEY, Value::String(error.to_string()));
        Ok(())
    }

    /// `processing -> queued` for a job interrupted by a process restart.
    ///
    /// The retry budget is left untouched.
    pub fn requeue_interrupted(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition(JobStatus::Queued, now)?;
        self.progress = 0;
        Ok(())
    }

    /// `processing -> failed`.
    pub fn mark_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition(JobStatus::Failed, now)?;
        self.completed_at = Some(now);
        self.error = Some(error.into());
        Ok(())
    }

    /// `queued | processing -> cancelled`.
    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition(JobStatus::Cancelled, now)
    }

    fn transition(&mut self, next: JobStatus, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::conflict(format!(
                "Job {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}
