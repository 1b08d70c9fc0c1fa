//! Retry decision: maps a failed attempt to the next action.
//!
//! Deciders are pure: given the attempt number and the failure reason they
//! return an outcome without side effects. Executing it (resubmitting the
//! job) is the worker loop's business.

use super::outcome::JobOutcome;
use super::retry::BackoffPolicy;

#[derive(Debug, Clone, Default)]
pub struct RetryDecider {
    policy: BackoffPolicy,
}

impl RetryDecider {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Decide what happens after `attempt` failed with `reason`.
    ///
    /// - `attempt < max_attempts`: retry after a full-jitter delay
    /// - otherwise: exhausted, the item is left Failed
    pub fn decide(&self, attempt: u32, reason: impl Into<String>) -> JobOutcome {
        let reason = reason.into();
        if self.policy.should_retry(attempt) {
            JobOutcome::retryable(reason, self.policy.compute_delay(attempt))
        } else {
            JobOutcome::permanent(format!(
                "retries exhausted after attempt {}/{}: {}",
                attempt, self.policy.max_attempts, reason
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn retries_with_bounded_delay() {
        let decider = RetryDecider::default();
        match decider.decide(1, "store down") {
            JobOutcome::RetryableFailure { reason, delay } => {
                assert_eq!(reason, "store down");
                assert!(delay <= Duration::from_secs(20));
            }
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[test]
    fn exhausted_at_max_attempts() {
        let decider = RetryDecider::default();
        let outcome = decider.decide(3, "no samples");
        assert!(matches!(outcome, JobOutcome::PermanentFailure { .. }));
        assert!(outcome.reason().unwrap().contains("no samples"));
        assert!(outcome.reason().unwrap().contains("3/3"));
    }
}
