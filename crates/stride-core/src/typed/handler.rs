//! Handler trait - executes a typed job and reports a `JobOutcome`.
//!
//! - `Handler<T>`: generic, one per job type
//! - `DynHandler`: object-safe, decodes the JSON payload itself
//! - `TypedHandler<T, H>`: the type-erasing adapter between the two

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use super::job::Job;
use crate::domain::{JobEnvelope, JobId, JobOutcome};

/// Delivery metadata handed to a handler next to its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobContext {
    pub job_id: JobId,
    /// 0 on first delivery.
    pub attempt: u32,
}

impl JobContext {
    pub fn from_envelope(envelope: &JobEnvelope) -> Self {
        Self {
            job_id: envelope.job_id(),
            attempt: envelope.attempt(),
        }
    }
}

#[async_trait]
pub trait Handler<T: Job>: Send + Sync {
    async fn handle(&self, job: T, ctx: JobContext) -> JobOutcome;
}

#[async_trait]
impl<T: Job, H: Handler<T>> Handler<T> for Arc<H> {
    async fn handle(&self, job: T, ctx: JobContext) -> JobOutcome {
        (**self).handle(job, ctx).await
    }
}

#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, envelope: &JobEnvelope) -> JobOutcome;
    fn job_type(&self) -> &str;
}

pub struct TypedHandler<T: Job, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Job, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Job, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(&self, envelope: &JobEnvelope) -> JobOutcome {
        // a payload that does not decode will never decode: no retry
        let job: T = match serde_json::from_value(envelope.payload().clone()) {
            Ok(job) => job,
            Err(e) => return JobOutcome::permanent(format!("json decode: {e}")),
        };
        self.handler
            .handle(job, JobContext::from_envelope(envelope))
            .await
    }

    fn job_type(&self) -> &str {
        T::TYPE
    }
}
