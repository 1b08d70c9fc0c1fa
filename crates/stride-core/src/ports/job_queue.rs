//! JobQueue port - the work-dispatch transport.
//!
//! Contract:
//! - at-least-once delivery, no ordering guarantee
//! - late acknowledgment: a popped job stays in flight until `ack`; a worker
//!   that dies before acking gets its job redelivered
//! - `retry` resubmits under the same job id with `attempt + 1`, delivered
//!   no earlier than `delay` from now

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{JobEnvelope, JobId, JobRequest, QueueError};

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn submit(&self, request: JobRequest) -> Result<JobId, QueueError>;

    async fn retry(&self, job: &JobEnvelope, delay: Duration) -> Result<(), QueueError>;

    /// Wait up to `timeout` for a deliverable job.
    async fn pop(&self, timeout: Duration) -> Result<Option<JobEnvelope>, QueueError>;

    async fn ack(&self, job_id: JobId) -> Result<(), QueueError>;
}
