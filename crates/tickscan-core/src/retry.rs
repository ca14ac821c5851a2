//! Retry schedule for transient fetch failures.

use std::time::Duration;

/// Geometric backoff with additive jitter.
///
/// The schedule is a pure function of the attempt number so tests can assert
/// it without sleeping; the fetcher is what actually awaits the delay.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Multiplicative factor for each subsequent retry.
    pub factor: f64,
    /// Total attempts per fetch call, including the first.
    pub max_attempts: u32,
    /// Additive jitter as a fraction of the delay, drawn from `[0, jitter)`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            factor: 2.5,
            max_attempts: 3,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Deterministic delay before retry `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let scale = self.factor.powi(attempt as i32);
        Duration::from_secs_f64(self.base.as_secs_f64() * scale)
    }

    /// Delay with jitter applied.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay(attempt);
        let jitter = delay.as_secs_f64() * self.jitter * fastrand::f64();
        delay + Duration::from_secs_f64(jitter)
    }

    pub const fn retries_remaining(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}
