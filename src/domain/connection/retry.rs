//! Reconnection policy shared by both transports.
//!
//! ## Counting
//!
//! The counter holds the number of consecutive failures. Failure `n`
//! schedules attempt `n` after `delay_for(n)` while `n < max_attempts`.
//! Failure number `max_attempts` is terminal: nothing further is scheduled
//! and the manager surfaces [`super::ConnectionError::RetriesExhausted`].
//! A successful connect resets the counter, so the next failure uses the
//! delay for attempt 1 again.

use std::time::Duration;

/// Shape of the delay curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base` every time.
    Fixed,
    /// `base * attempt`.
    Linear,
    /// `base * 2^(attempt - 1)`.
    Exponential,
}

/// Outcome of consulting the policy after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Stop and report the terminal state.
    GiveUp { attempts: u32 },
}

/// Retry count, base delay and attempt bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay for the first attempt.
    ///
    /// Default: 1 second
    pub base_delay: Duration,

    /// Upper bound for any single delay.
    ///
    /// Default: 30 seconds
    pub max_delay: Duration,

    /// Consecutive failures after which the manager gives up.
    ///
    /// Default: 10
    pub max_attempts: u32,

    /// Delay curve.
    pub backoff: Backoff,
}

/// Smallest delay ever returned; a zero base must not become a hot loop.
const MIN_DELAY: Duration = Duration::from_millis(10);

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::for_socket()
    }
}

impl ReconnectPolicy {
    /// Persistent socket: exponential, 1s doubling up to 30s, 10 attempts.
    pub fn for_socket() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
            backoff: Backoff::Exponential,
        }
    }

    /// Push stream: linear 3s steps up to 30s, 5 attempts.
    pub fn for_stream() -> Self {
        Self {
            base_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
            backoff: Backoff::Linear,
        }
    }

    /// Replace the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Replace the delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Replace the attempt bound.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Replace the delay curve.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay before attempt `attempt` (1-based). Non-zero, capped and
    /// non-decreasing in `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let raw = match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        };
        let cap = self.max_delay.max(MIN_DELAY);
        raw.clamp(MIN_DELAY, cap)
    }

    /// Decide what to do after the `failures`-th consecutive failure.
    pub fn decide(&self, failures: u32) -> RetryDecision {
        if failures < self.max_attempts {
            RetryDecision::Retry {
                attempt: failures,
                delay: self.delay_for(failures),
            }
        } else {
            RetryDecision::GiveUp { attempts: failures }
        }
    }

    /// Whether `failures` consecutive failures exhaust the policy.
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}

/// Consecutive-failure counter owned by one connection manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryCounter(u32);

impl RetryCounter {
    /// Starts at zero.
    pub fn new() -> Self {
        Self(0)
    }

    /// Records a failure and returns the new count.
    pub fn record_failure(&mut self) -> u32 {
        self.0 = self.0.saturating_add(1);
        self.0
    }

    /// Back to zero after a successful connect or a liveness trigger.
    pub fn reset(&mut self) {
        self.0 = 0;
    }

    /// Current count.
    pub fn get(&self) -> u32 {
        self.0
    }
}
