//! Job record store and report artifact configuration.

use serde::{Deserialize, Serialize};

/// Job record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store backend: `"memory"` or `"file"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Directory holding one JSON document per job (file backend only).
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            path: default_store_path(),
        }
    }
}

/// Rendered report artifact configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Root directory where rendered reports are written.
    #[serde(default = "default_artifact_root")]
    pub root_path: String,
    /// Public base URL under which `root_path` is served.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Render `pdf`/`excel` requests as a JSON document instead of rejecting them.
    #[serde(default = "default_true")]
    pub document_fallback: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            root_path: default_artifact_root(),
            public_base_url: default_public_base_url(),
            document_fallback: default_true(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_store_path() -> String {
    "data/jobs".to_string()
}

fn default_artifact_root() -> String {
    "data/reports".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080/reports".to_string()
}

fn default_true() -> bool {
    true
}
