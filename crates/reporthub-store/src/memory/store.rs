//! In-memory job store implementation using the dashmap crate.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use reporthub_core::result::AppResult;
use reporthub_core::traits::record_store::{RecordFilter, RecordStore};
use reporthub_core::types::id::JobId;
use reporthub_entity::job::JobRecord;

/// In-memory job store.
///
/// Records are cloned in and out, so readers never observe a record while
/// it is being replaced.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    /// Records keyed by job id.
    records: Arc<DashMap<JobId, JobRecord>>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore<JobRecord, JobId> for MemoryJobStore {
    async fn put(&self, record: &JobRecord) -> AppResult<()> {
        self.records.insert(record.id, record.clone());
        trace!(job_id = %record.id, status = %record.status, "Stored job record");
        Ok(())
    }

    async fn get(&self, id: &JobId) -> AppResult<Option<JobRecord>> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    async fn list(&self, filter: Option<RecordFilter<'_, JobRecord>>) -> AppResult<Vec<JobRecord>> {
        let mut records: Vec<JobRecord> = self
            .records
            .iter()
            .filter(|entry| filter.is_none_or(|f| f(entry.value())))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}
