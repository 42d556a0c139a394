//! Reconnect backoff.

use std::time::Duration;

/// Delay before reconnect attempt `attempt`: `base * 2^attempt`, capped.
pub fn compute_backoff(base: Duration, ceiling: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    let max_ms = ceiling.as_millis() as u64;
    let multiplier = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(multiplier).min(max_ms))
}

/// Consecutive failed connection attempts.
///
/// Reset by any inbound message, so a connection that proves healthy
/// starts the next outage from the shortest delay.
#[derive(Debug, Clone)]
pub struct ReconnectState {
    attempt: u32,
    next_delay: Duration,
    base: Duration,
    ceiling: Duration,
    max_attempts: u32,
}

impl ReconnectState {
    pub fn new(base: Duration, ceiling: Duration, max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            next_delay: base,
            base,
            ceiling,
            max_attempts,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Count a failure. `None` once the attempt budget is exhausted.
    pub fn on_failure(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        if self.attempt > self.max_attempts {
            return None;
        }
        self.next_delay = compute_backoff(self.base, self.ceiling, self.attempt);
        Some(self.next_delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.next_delay = self.base;
    }
}
