//! Bounded retry with exponential backoff.
//!
//! Attempts are counted from 1. After a retryable failure on attempt `n` the
//! executor waits `base_delay_ms * backoff_multiplier^(n-1)` before the next
//! attempt. A permanent failure is returned immediately.

use recall_core::AppResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::ClassifiedError;

/// Retry bounds and backoff shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts including the first; 0 behaves like 1
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    pub base_delay_ms: u64,

    /// Factor applied to the delay after each further failure
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            backoff_multiplier,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1, 0, 1.0)
    }

    /// Wait before the attempt following failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        if millis.is_finite() && millis > 0.0 {
            Duration::from_millis(millis as u64)
        } else {
            Duration::ZERO
        }
    }
}

/// Run `operation` under `policy`.
///
/// The operation is invoked exactly `min(max_attempts, attempts until success
/// or permanent failure)` times. The last error is returned when attempts run
/// out.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut operation: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}/{}", label, attempt, max_attempts);
                }
                return Ok(value);
            }
            Err(err) => {
                let classified = ClassifiedError::classify(&err);

                if !classified.retryable {
                    tracing::warn!(
                        status = ?classified.status_code,
                        "{} failed with a permanent error: {}",
                        label,
                        classified.message
                    );
                    return Err(err);
                }

                if attempt >= max_attempts {
                    tracing::warn!(
                        attempts = attempt,
                        "{} failed after exhausting retries: {}",
                        label,
                        classified.message
                    );
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max = max_attempts,
                    backoff_ms = delay.as_millis() as u64,
                    error = %classified.message,
                    "Retrying {} after transient error",
                    label
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
