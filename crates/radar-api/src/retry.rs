//! Backoff policy for transient model API failures.

use rand::Rng;
use std::time::Duration;

/// How often and how patiently a failed request is re-sent.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay, including server-requested ones.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retrying after `attempt` (zero-based) failed.
    ///
    /// A server-provided `Retry-After` wins, clamped to `max_delay`.
    /// Otherwise `initial_delay * backoff_factor^attempt` with ±25% jitter.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(server_delay) = retry_after {
            return server_delay.min(self.max_delay);
        }

        let max_ms = self.max_delay.as_millis() as f64;
        let base = self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let jitter = rand::rng().random_range(0.75..=1.25);
        let jittered = (base.min(max_ms) * jitter).min(max_ms);

        Duration::from_millis(jittered as u64)
    }
}
