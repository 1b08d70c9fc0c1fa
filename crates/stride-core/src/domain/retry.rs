//! Backoff policy: retry eligibility and full-jitter delays.
//!
//! Pure functions of the attempt count. No I/O, no clock.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Bounded exponential backoff with full jitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Attempts `0..max_attempts` may be retried.
    pub max_attempts: u32,

    /// Delay scale for attempt 0.
    pub base: Duration,

    /// Upper bound of any delay.
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(10),
            cap: Duration::from_secs(600),
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base: Duration, cap: Duration) -> Self {
        Self {
            max_attempts,
            base,
            cap,
        }
    }

    /// May a job that just failed on `attempt` be resubmitted?
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// `min(cap, base * 2^attempt)`, saturating.
    pub fn upper_bound(&self, attempt: u32) -> Duration {
        let base_ms = self.base.as_millis().min(u64::MAX as u128) as u64;
        let cap_ms = self.cap.as_millis().min(u64::MAX as u128) as u64;
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor).min(cap_ms))
    }

    /// Full-jitter delay: uniform in `[0, upper_bound(attempt)]`,
    /// millisecond resolution.
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        self.compute_delay_with(&mut rand::thread_rng(), attempt)
    }

    pub fn compute_delay_with<R: Rng + ?Sized>(&self, rng: &mut R, attempt: u32) -> Duration {
        let upper_ms = self.upper_bound(attempt).as_millis() as u64;
        Duration::from_millis(rng.gen_range(0..=upper_ms))
    }
}
