use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt; a delivery makes at most
    /// `max_retries + 1` attempts.
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: u64,
    pub attempt_timeout_ms: u64,
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2,
            attempt_timeout_ms: 10_000,
            jitter_ratio: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry_index` (0-based):
    /// `initial * multiplier^retry_index`, capped at `max_delay_ms`.
    pub fn delay_for_retry(&self, retry_index: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .checked_pow(retry_index)
            .unwrap_or(u64::MAX);
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);

        Duration::from_millis(delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_ratio <= 0.0 {
            return delay;
        }

        let ratio = self.jitter_ratio.min(1.0);
        let jitter = rand::random_range(-ratio..=ratio);

        delay.mul_f64(1.0 + jitter)
    }
}
