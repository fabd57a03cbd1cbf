//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every section falls back to its defaults when absent.

pub mod logging;
pub mod schedule;
pub mod storage;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::logging::LoggingConfig;
pub use self::schedule::ScheduleConfig;
pub use self::storage::{ArtifactConfig, StoreConfig};
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scheduler and worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Job record store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Rendered artifact settings.
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Recurring report schedules.
    #[serde(default)]
    pub schedules: Vec<ScheduleConfig>,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `REPORTHUB_`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("REPORTHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from an inline TOML document.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = AppConfig::from_toml("").expect("empty config");
        assert_eq!(config.worker.max_concurrent, 3);
        assert_eq!(config.worker.tick_interval_seconds, 5);
        assert_eq!(config.worker.default_max_retries, 3);
        assert_eq!(config.store.provider, "memory");
        assert!(config.artifacts.document_fallback);
        assert!(config.schedules.is_empty());
    }

    #[test]
    fn test_overrides_and_schedules() {
        let config = AppConfig::from_toml(
            r#"
            [worker]
            max_concurrent = 8
            retry_base_delay_ms = 250

            [store]
            provider = "file"
            path = "/var/lib/reporthub/jobs"

            [[schedules]]
            name = "Weekly digest"
            frequency = "weekly"
            time = "08:30"
            day_of_week = 1
            request = { type = "intelligence_digest", format = "pdf", user_id = "system" }
            "#,
        )
        .expect("valid config");

        assert_eq!(config.worker.max_concurrent, 8);
        assert_eq!(config.worker.retry_base_delay_ms, 250);
        assert_eq!(config.worker.tick_interval_seconds, 5);
        assert_eq!(config.store.provider, "file");
        assert_eq!(config.schedules.len(), 1);
        assert_eq!(config.schedules[0].day_of_week, Some(1));
        assert!(config.schedules[0].is_active);
        assert_eq!(config.schedules[0].request["type"], "intelligence_digest");
    }
}
