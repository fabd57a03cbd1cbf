//! Retry and exponential backoff decisions.

use std::time::Duration;

use reporthub_core::config::WorkerConfig;

use crate::error::JobExecutionError;

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Re-queue the job instead of failing it.
    pub retryable: bool,
    /// Delay before the next attempt becomes eligible.
    pub delay: Duration,
}

/// Exponential backoff policy.
///
/// The n-th retry (1-based) waits `base_delay * 2^n`, capped at `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Policy from the worker section of the configuration.
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.retry_base_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
        )
    }

    /// Delay before the retry that follows `retry_count` earlier retries.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        retry_count
            .checked_add(1)
            .and_then(|exp| 2u32.checked_pow(exp))
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Decide whether a failed attempt is retried.
    pub fn decide(&self, retry_count: u32, max_retries: u32, error: &JobExecutionError) -> RetryDecision {
        if retry_count < max_retries && error.is_retryable() {
            RetryDecision {
                retryable: true,
                delay: self.backoff(retry_count),
            }
        } else {
            RetryDecision {
                retryable: false,
                delay: Duration::ZERO,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}
