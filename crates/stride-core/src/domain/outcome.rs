//! Outcome of one job execution.
//!
//! Handlers never raise to ask for a retry. They return an outcome and the
//! worker loop translates it into queue operations:
//! - `Success` -> ack
//! - `RetryableFailure` -> `JobQueue::retry(job, delay)`, then ack
//! - `PermanentFailure` -> ack (the item stays Failed)

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobOutcome {
    Success,

    RetryableFailure {
        reason: String,
        #[serde(with = "duration_ms")]
        delay: Duration,
    },

    PermanentFailure {
        reason: String,
    },
}

impl JobOutcome {
    pub fn retryable(reason: impl Into<String>, delay: Duration) -> Self {
        JobOutcome::RetryableFailure {
            reason: reason.into(),
            delay,
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        JobOutcome::PermanentFailure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            JobOutcome::Success => None,
            JobOutcome::RetryableFailure { reason, .. } | JobOutcome::PermanentFailure { reason } => {
                Some(reason)
            }
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
