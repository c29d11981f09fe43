//! Fixed-delay retry budget for the fetch step.
//!
//! Each poll cycle gets a fresh budget of `max_attempts` tries separated by a
//! constant `interval`:
//!
//! ```text
//! attempt 1 fails -> sleep(interval)
//! attempt 2 fails -> sleep(interval)
//! ...
//! attempt N fails -> MaxAttemptLimitError(N), no sleep
//! ```
//!
//! A monitor that stays down therefore stalls each cycle for at most
//! `(N - 1) * interval` plus the request timeouts, never longer.

use std::time::Duration;

use thiserror::Error;

/// Raised once the attempt budget of a cycle is spent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackoffError {
    #[error("Maximum number of attempts exceeded: {0}")]
    MaxAttemptLimitError(u32),
}

/// Retry budget with a constant delay between attempts.
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    interval: Duration,
    max_attempts: u32,
    /// Failed attempts recorded so far.
    failures: u32,
}

impl FixedBackoff {
    /// `max_attempts` is clamped to at least one.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
            failures: 0,
        }
    }

    /// Records a failed attempt and returns how long to wait before the next.
    ///
    /// # Errors
    ///
    /// `MaxAttemptLimitError` when the failed attempt was the last allowed one.
    pub fn next_sleep(&mut self) -> Result<Duration, BackoffError> {
        self.failures += 1;
        if self.failures >= self.max_attempts {
            return Err(BackoffError::MaxAttemptLimitError(self.max_attempts));
        }
        Ok(self.interval)
    }

    /// Restores the full budget.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Number of the attempt about to run, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.failures + 1
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
