//! Exponential backoff with full jitter.
//!
//! `base * 2^(attempt - 1)`, capped at `max`. With jitter enabled the final
//! delay is drawn uniformly from `[0, capped]` so concurrent workers that
//! failed together do not retry together.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
    /// Apply full jitter.
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

/// Bounded, optionally jittered delay sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, jitter: bool) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter,
        }
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay before retry number `attempt_number` (starting at 1).
    ///
    /// An attempt number of 0 is treated as 1.
    pub fn next_delay(&self, attempt_number: u32) -> Duration {
        let capped = self.capped_delay(attempt_number);
        if !self.jitter || capped.is_zero() {
            return capped;
        }

        let upper = u64::try_from(capped.as_nanos()).unwrap_or(u64::MAX);
        let jittered = rand::rng().random_range(0..=upper);
        Duration::from_nanos(jittered)
    }

    /// Exponential delay before jitter.
    fn capped_delay(&self, attempt_number: u32) -> Duration {
        let exponent = attempt_number.max(1) - 1;
        let delay = 2u32
            .checked_pow(exponent)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(self.max_delay);
        delay.min(self.max_delay)
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.jitter,
        )
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&BackoffConfig::default())
    }
}
