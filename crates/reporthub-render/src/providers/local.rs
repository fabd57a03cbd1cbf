//! Local filesystem artifact store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::fs;
use tracing::debug;

use reporthub_core::error::{AppError, ErrorKind};
use reporthub_core::result::AppResult;
use reporthub_core::traits::artifact::ArtifactStore;
use reporthub_core::types::id::JobId;

/// Writes rendered reports into a flat directory and hands out URLs under a
/// public base URL that serves that directory.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    /// Root directory for report files.
    root: PathBuf,
    /// Base URL without trailing slash.
    public_base_url: String,
}

impl LocalArtifactStore {
    /// Create a store rooted at the given path, creating it if needed.
    pub async fn new(root_path: &str, public_base_url: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create report directory: {}", root.display()),
                e,
            )
        })?;
        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a stored report back by file name.
    pub async fn read_bytes(&self, file_name: &str) -> AppResult<Bytes> {
        let full_path = self.resolve(file_name);
        let data = fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Report file not found: {file_name}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read report file: {file_name}"),
                    e,
                )
            }
        })?;
        Ok(Bytes::from(data))
    }

    fn resolve(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name.trim_start_matches('/'))
    }

    fn file_name(job_id: JobId, extension: &str) -> String {
        format!(
            "report_{}_{}.{}",
            job_id,
            Utc::now().timestamp_millis(),
            extension.trim_start_matches('.')
        )
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    fn store_type(&self) -> &str {
        "local"
    }

    async fn store(&self, job_id: JobId, extension: &str, data: Bytes) -> AppResult<String> {
        let file_name = Self::file_name(job_id, extension);
        let full_path = self.resolve(&file_name);

        fs::write(&full_path, &data).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to write report file: {}", full_path.display()),
                e,
            )
        })?;

        debug!(%job_id, file = %file_name, bytes = data.len(), "Stored report artifact");
        Ok(format!("{}/{}", self.public_base_url, file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_writes_file_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(
            dir.path().to_str().unwrap(),
            "http://localhost:8080/reports/",
        )
        .await
        .unwrap();

        let job_id = JobId::new();
        let url = store
            .store(job_id, "csv", Bytes::from_static(b"a,b\n1,2\n"))
            .await
            .unwrap();

        let prefix = format!("http://localhost:8080/reports/report_{job_id}_");
        assert!(url.starts_with(&prefix), "unexpected url {url}");
        assert!(url.ends_with(".csv"));

        let file_name = url.rsplit('/').next().unwrap();
        let data = store.read_bytes(file_name).await.unwrap();
        assert_eq!(&data[..], b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("reports");
        let store = LocalArtifactStore::new(root.to_str().unwrap(), "http://x")
            .await
            .unwrap();
        assert!(store.root().is_dir());
        assert_eq!(store.store_type(), "local");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path().to_str().unwrap(), "http://x")
            .await
            .unwrap();
        let err = store.read_bytes("report_missing.json").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
