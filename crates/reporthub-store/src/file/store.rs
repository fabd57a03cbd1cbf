//! Local filesystem job store.
//!
//! Each record is one pretty-printed JSON document named `{job_id}.json`.
//! Writes go to a uniquely named temporary file in the same directory and
//! are then renamed over the target, so a reader sees either the previous
//! or the new document, never a torn one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use reporthub_core::error::{AppError, ErrorKind};
use reporthub_core::result::AppResult;
use reporthub_core::traits::record_store::{RecordFilter, RecordStore};
use reporthub_core::types::id::JobId;
use reporthub_entity::job::JobRecord;

const RECORD_EXTENSION: &str = "json";

/// Job store persisting records as JSON files under a root directory.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    /// Directory holding the record files.
    root: PathBuf,
}

impl FileJobStore {
    /// Create a store rooted at `root_path`, creating the directory if needed.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create job store directory: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &JobId) -> PathBuf {
        self.root.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    async fn read_record(path: &Path) -> AppResult<Option<JobRecord>> {
        match fs::read(path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to read job record: {}", path.display()),
                e,
            )),
        }
    }
}

#[async_trait]
impl RecordStore<JobRecord, JobId> for FileJobStore {
    async fn put(&self, record: &JobRecord) -> AppResult<()> {
        let target = self.record_path(&record.id);
        let temp = self
            .root
            .join(format!(".{}.{}.tmp", record.id, Uuid::new_v4().simple()));
        let data = serde_json::to_vec_pretty(record)?;

        fs::write(&temp, &data).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to write job record: {}", temp.display()),
                e,
            )
        })?;

        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to replace job record: {}", target.display()),
                e,
            ));
        }

        debug!(job_id = %record.id, status = %record.status, bytes = data.len(), "Wrote job record");
        Ok(())
    }

    async fn get(&self, id: &JobId) -> AppResult<Option<JobRecord>> {
        Self::read_record(&self.record_path(id)).await
    }

    async fn list(&self, filter: Option<RecordFilter<'_, JobRecord>>) -> AppResult<Vec<JobRecord>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to list job store: {}", self.root.display()),
                e,
            )
        })?;

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(Some(record)) => {
                    if filter.is_none_or(|f| f(&record)) {
                        records.push(record);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable job record"),
            }
        }

        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.root.is_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reporthub_entity::job::{JobRequest, JobStatus, ReportFormat};

    fn make_record() -> JobRecord {
        let request = JobRequest::new("event_calendar", ReportFormat::Csv, "u-7");
        JobRecord::new(JobId::new(), request, 3, Utc::now())
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path().to_str().unwrap()).await.unwrap();

        let record = make_record();
        store.put(&record).await.unwrap();

        let fetched = store.get(&record.id).await.unwrap();
        assert_eq!(fetched, Some(record));
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path().to_str().unwrap()).await.unwrap();

        let mut record = make_record();
        store.put(&record).await.unwrap();
        record.mark_processing(Utc::now()).unwrap();
        store.put(&record).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![format!("{}.json", record.id)]);
        let fetched = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        let record = make_record();
        FileJobStore::new(path).await.unwrap().put(&record).await.unwrap();

        let reopened = FileJobStore::new(path).await.unwrap();
        let listed = reopened.list(None).await.unwrap();
        assert_eq!(listed, vec![record]);
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path().to_str().unwrap()).await.unwrap();
        store.put(&make_record()).await.unwrap();
        std::fs::write(dir.path().join("garbage.json"), b"{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        assert_eq!(store.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path().to_str().unwrap()).await.unwrap();
        assert!(store.get(&JobId::new()).await.unwrap().is_none());
    }
}
