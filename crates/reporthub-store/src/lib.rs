//! # reporthub-store
//!
//! Job record store implementations for ReportHub. Supports two modes:
//!
//! - **memory**: In-process store backed by [dashmap](https://crates.io/crates/dashmap)
//! - **file**: One JSON document per job on the local filesystem
//!
//! The backend is selected at runtime based on configuration.

use std::sync::Arc;

use reporthub_core::traits::record_store::RecordStore;
use reporthub_core::types::id::JobId;
use reporthub_entity::job::JobRecord;

#[cfg(feature = "file")]
pub mod file;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;

pub use provider::JobStoreManager;

/// Record store specialised to report jobs.
pub type JobStore = dyn RecordStore<JobRecord, JobId>;

/// Shared handle to a job store.
pub type SharedJobStore = Arc<JobStore>;
