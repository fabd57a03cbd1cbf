//! Background worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Report job worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the scheduler loop is started.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum number of jobs in `processing` at any instant.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Interval in seconds between scheduler ticks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,
    /// Retry budget applied when a request does not carry its own.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    /// Base unit of the exponential retry backoff, in milliseconds.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
    /// Upper bound for a single backoff delay, in milliseconds.
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
    /// How long `stop()` waits for in-flight jobs, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl WorkerConfig {
    /// Tick interval as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_concurrent: default_max_concurrent(),
            tick_interval_seconds: default_tick_interval(),
            default_max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent() -> usize {
    3
}

fn default_tick_interval() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_retry_max_delay() -> u64 {
    300_000
}

fn default_shutdown_grace() -> u64 {
    30
}
