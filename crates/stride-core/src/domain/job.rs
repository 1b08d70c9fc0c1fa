//! Job envelope: what travels through the job queue.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::JobId;

/// Name of a job kind, e.g. `stride.workout.process.v1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobType(String);

impl JobType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A job to submit: type + JSON payload. The queue assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_type: JobType,
    pub payload: serde_json::Value,
}

impl JobRequest {
    pub fn new(job_type: JobType, payload: serde_json::Value) -> Self {
        Self { job_type, payload }
    }
}

/// A delivered job.
///
/// `attempt` is the transport's retry counter: 0 on first delivery,
/// incremented by every `JobQueue::retry`. It is not persisted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    job_id: JobId,
    job_type: JobType,
    payload: serde_json::Value,
    attempt: u32,
}

impl JobEnvelope {
    pub fn new(job_id: JobId, request: JobRequest) -> Self {
        Self {
            job_id,
            job_type: request.job_type,
            payload: request.payload,
            attempt: 0,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn job_type(&self) -> &JobType {
        &self.job_type
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The same job, one attempt later.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_attempt_keeps_identity() {
        let env = JobEnvelope::new(
            JobId::generate(),
            JobRequest::new(JobType::new("t"), serde_json::json!({"work_item_id": 1})),
        );
        assert_eq!(env.attempt(), 0);

        let retried = env.next_attempt().next_attempt();
        assert_eq!(retried.attempt(), 2);
        assert_eq!(retried.job_id(), env.job_id());
        assert_eq!(retried.payload(), env.payload());
    }
}
