//! Artifact store trait for rendered report output.

use async_trait::async_trait;
use bytes::Bytes;

use crate::result::AppResult;
use crate::types::id::JobId;

/// Destination for rendered report bytes.
///
/// The returned string is the URL recorded as the job's `result_url`.
#[async_trait]
pub trait ArtifactStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the store type name (e.g., "local").
    fn store_type(&self) -> &str;

    /// Persist `data` for `job_id` using the given file extension and
    /// return the URL under which it can be fetched.
    async fn store(&self, job_id: JobId, extension: &str, data: Bytes) -> AppResult<String>;
}
