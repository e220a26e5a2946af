//! Bounded retry with a fixed backoff.
//!
//! # Responsibilities
//! - Count attempts against a hard ceiling
//! - Hand out the delay to wait before the next attempt
//!
//! # Design Decisions
//! - Fixed delay, no jitter: alert delivery is low volume
//! - The state lives inside one delivery and is dropped afterwards

use std::time::Duration;

/// Retry limits shared by every delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    /// Delay between two attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Start tracking a fresh delivery.
    pub fn start(&self) -> RetryState {
        RetryState {
            attempt: 0,
            policy: *self,
        }
    }
}

/// Attempt counter for a single delivery.
#[derive(Debug)]
pub struct RetryState {
    attempt: u32,
    policy: RetryPolicy,
}

impl RetryState {
    /// Register a new attempt. Returns `false` once the ceiling is reached.
    pub fn begin_attempt(&mut self) -> bool {
        if self.attempt >= self.policy.max_attempts {
            return false;
        }
        self.attempt += 1;
        true
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt, or `None` when no attempt is left.
    pub fn next_delay(&self) -> Option<Duration> {
        (self.attempt < self.policy.max_attempts).then_some(self.policy.backoff)
    }
}
