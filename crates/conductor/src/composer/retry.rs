//! Retry policy for retry compositions

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::workflow::result::duration_millis;

/// Formula used to compute the delay between attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base * 2^(attempt - 1)`
    #[default]
    Exponential,
    /// `base * attempt`
    Linear,
    /// `base`
    Fixed,
}

impl fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exponential => write!(f, "exponential"),
            Self::Linear => write!(f, "linear"),
            Self::Fixed => write!(f, "fixed"),
        }
    }
}

/// Attempt budget and backoff for a retry composition
///
/// # Example
///
/// ```
/// use conductor::composer::{BackoffStrategy, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default()
///     .with_max_attempts(4)
///     .with_base_delay(Duration::from_millis(100));
///
/// // Delay after the first failed attempt
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
/// // Delay after the third
/// assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
///
/// let linear = policy.with_backoff(BackoffStrategy::Linear);
/// assert_eq!(linear.delay_for_attempt(3), Duration::from_millis(300));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,

    pub backoff: BackoffStrategy,

    #[serde(with = "duration_millis")]
    pub base_delay: Duration,

    /// Upper bound for any single delay
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with fixed delays
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Fixed,
            base_delay: delay,
            max_delay: delay,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.backoff {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt),
            BackoffStrategy::Exponential => {
                let factor = 2u32.checked_pow(attempt - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        };
        delay.min(self.max_delay)
    }

    pub fn has_attempts_remaining(&self, current_attempt: u32) -> bool {
        current_attempt < self.max_attempts
    }
}
