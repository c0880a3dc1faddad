use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How much randomness is applied to each backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jitter {
    /// Exact exponential backoff
    None,
    /// Uniform in `[0, backoff]`
    #[default]
    Full,
    /// Uniform in `[backoff / 2, backoff]`
    Equal,
}

/// Configuration for retrying throttled requests with exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    pub max_backoff_ms: u64,

    /// Multiplier applied to backoff after each retry
    pub backoff_multiplier: f64,

    pub jitter: Jitter,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms,
            max_backoff_ms,
            backoff_multiplier,
            jitter: Jitter::Full,
        }
    }

    /// Returns a policy with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            backoff_multiplier: 1.0,
            jitter: Jitter::None,
        }
    }

    /// Returns a policy optimized for quick transient failures.
    pub fn fast() -> Self {
        Self::new(3, 10, 100, 2.0)
    }

    /// Returns a policy for longer-running retry scenarios.
    pub fn standard() -> Self {
        Self::new(5, 100, 5000, 2.0)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total number of requests an operation may send
    pub fn total_attempts(&self) -> u32 {
        self.max_attempts.saturating_add(1)
    }

    /// Calculates the backoff duration for a given retry number (0-indexed),
    /// before jitter.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let backoff_ms = (self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent))
            .min(self.max_backoff_ms as f64) as u64;
        Duration::from_millis(backoff_ms)
    }

    /// Backoff for a retry with this policy's jitter applied
    pub fn jittered_backoff<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.backoff_duration(attempt).as_millis() as u64;
        let ms = match self.jitter {
            Jitter::None => base,
            Jitter::Full => rng.gen_range(0..=base),
            Jitter::Equal => base / 2 + rng.gen_range(0..=base - base / 2),
        };
        Duration::from_millis(ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.backoff_multiplier < 1.0 {
            return Err("backoff_multiplier must be at least 1.0".to_string());
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err("initial_backoff_ms must not exceed max_backoff_ms".to_string());
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    /// Returns a sensible default retry policy (same as `standard()`).
    fn default() -> Self {
        Self::standard()
    }
}
