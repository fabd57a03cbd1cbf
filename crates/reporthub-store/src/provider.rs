//! Job store manager that dispatches to the configured backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use reporthub_core::config::StoreConfig;
use reporthub_core::error::AppError;
use reporthub_core::result::AppResult;
use reporthub_core::traits::record_store::{RecordFilter, RecordStore};
use reporthub_core::types::id::JobId;
use reporthub_entity::job::JobRecord;

use crate::SharedJobStore;

/// Job store manager that wraps the configured store backend.
///
/// The backend is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct JobStoreManager {
    /// The inner store backend.
    inner: SharedJobStore,
}

impl JobStoreManager {
    /// Create a new job store manager from configuration.
    pub async fn new(config: &StoreConfig) -> AppResult<Self> {
        let inner: SharedJobStore = match config.provider.as_str() {
            #[cfg(feature = "file")]
            "file" => {
                info!(path = %config.path, "Initializing file job store");
                Arc::new(crate::file::FileJobStore::new(&config.path).await?)
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory job store");
                Arc::new(crate::memory::MemoryJobStore::new())
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown job store provider: '{other}'. Supported: memory, file"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a store manager from an existing backend (for testing).
    pub fn from_store(store: SharedJobStore) -> Self {
        Self { inner: store }
    }

    /// Shared handle to the inner backend.
    pub fn store(&self) -> SharedJobStore {
        Arc::clone(&self.inner)
    }
}

#[async_trait]
impl RecordStore<JobRecord, JobId> for JobStoreManager {
    async fn put(&self, record: &JobRecord) -> AppResult<()> {
        self.inner.put(record).await
    }

    async fn get(&self, id: &JobId) -> AppResult<Option<JobRecord>> {
        self.inner.get(id).await
    }

    async fn list(&self, filter: Option<RecordFilter<'_, JobRecord>>) -> AppResult<Vec<JobRecord>> {
        self.inner.list(filter).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
