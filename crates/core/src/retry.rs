//! Bounded retry policy with exponential backoff (PRD-20).
//!
//! Transient stage failures are re-attempted up to [`RetryPolicy::max_attempts`]
//! with a delay that doubles per failure and clamps at
//! [`RetryPolicy::max_delay`]. Permanent failures never consume retry budget.

use std::time::Duration;

/// Default attempt ceiling per stage.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Tunable parameters for the retry strategy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts per stage, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempts_so_far` tries.
    pub fn allows_retry(&self, attempts_so_far: u32) -> bool {
        attempts_so_far < self.max_attempts
    }

    /// Backoff delay before attempt number `next_attempt` (1-based).
    ///
    /// The first attempt runs immediately; attempt 2 waits `initial_delay`,
    /// attempt 3 waits `initial_delay * multiplier`, and so on, clamped to
    /// `max_delay`.
    pub fn delay_for_attempt(&self, next_attempt: u32) -> Duration {
        if next_attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (next_attempt - 2) as i32;
        let factor = self.multiplier.powi(exponent);
        let ms = (self.initial_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(ms).min(self.max_delay)
    }
}
