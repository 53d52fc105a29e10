/*!
 * Retry budget and exponential backoff for node attempts.
 */

use rand::Rng;
use std::time::Duration;

use crate::app_config::EngineOptions;

/// How often and how patiently a failed node is retried
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retry_attempts: u32,
    /// Delay before the first retry, doubled for each later one
    pub base_backoff: Duration,
    /// Upper bound of one delay, jitter included
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retry_attempts: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            retry_attempts,
            base_backoff,
            max_backoff,
        }
    }

    pub fn from_options(options: &EngineOptions) -> Self {
        Self::new(
            options.retry_attempts,
            Duration::from_millis(options.retry_backoff_ms),
            Duration::from_millis(options.max_backoff_ms),
        )
    }

    /// Attempts a node may make in total
    pub fn max_attempts(&self) -> u32 {
        self.retry_attempts.saturating_add(1)
    }

    /// Whether a node that has made `attempts` attempts may try again
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts()
    }

    /// Deterministic part of the delay before retry number `retry` (1-based)
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(20);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Delay before retry number `retry`, with up to 25% random jitter
    pub fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        let jitter_ms = (base.as_millis() / 4) as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        (base + jitter).min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_options(&EngineOptions::default())
    }
}
