//! ItemProcessor - per-item idempotent processing.
//!
//! # Flow of `process_item`
//! 1. fetch-or-create the result record (Pending when new)
//! 2. already Completed -> success, no writes
//! 3. -> Processing, persisted before any computation, so a crash from here
//!    on leaves a visible "stuck in processing" row
//! 4. aggregate samples
//! 5. -> Completed with the metrics (terminal)
//!
//! Any failure in 1-5 marks the record Failed (when one exists) and asks the
//! `RetryDecider` what to do next.
//!
//! There is no row lock. Two deliveries of the same item can both pass the
//! Completed check and both compute; the last write wins with identical
//! metrics. `with_item_lock` closes that window with a per-item lease.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::lock_service::LockService;
use crate::domain::{
    Aggregates, JobOutcome, ProcessingResult, ResultStatus, RetryDecider, StoreError, WorkItemId,
};
use crate::ports::{AggregationStore, Clock, ResultStore};
use crate::typed::{Handler, Job, JobContext};

/// Payload of the per-item processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessItemJob {
    pub work_item_id: WorkItemId,
}

impl Job for ProcessItemJob {
    const TYPE: &'static str = "stride.workout.process.v1";
}

enum Progress {
    AlreadyCompleted,
    Completed(Aggregates),
}

#[derive(Clone)]
struct ItemLock {
    locks: LockService,
    ttl: Duration,
}

#[derive(Clone)]
pub struct ItemProcessor {
    results: Arc<dyn ResultStore>,
    aggregates: Arc<dyn AggregationStore>,
    decider: RetryDecider,
    clock: Arc<dyn Clock>,
    item_lock: Option<ItemLock>,
}

impl ItemProcessor {
    pub fn new(
        results: Arc<dyn ResultStore>,
        aggregates: Arc<dyn AggregationStore>,
        decider: RetryDecider,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            results,
            aggregates,
            decider,
            clock,
            item_lock: None,
        }
    }

    /// Serialize deliveries of the same item through `lock:process_workout:<id>`.
    pub fn with_item_lock(mut self, locks: LockService, ttl: Duration) -> Self {
        self.item_lock = Some(ItemLock { locks, ttl });
        self
    }

    pub fn item_lock_name(id: WorkItemId) -> String {
        format!("process_workout:{}", id.get())
    }

    /// Run the state machine for `id`. `attempt` is the transport's retry
    /// counter of the current delivery.
    pub async fn process_item(&self, id: WorkItemId, attempt: u32) -> JobOutcome {
        let Some(item_lock) = &self.item_lock else {
            return self.process_unlocked(id, attempt).await;
        };

        let name = Self::item_lock_name(id);
        match item_lock
            .locks
            .with_lock(&name, item_lock.ttl, || self.process_unlocked(id, attempt))
            .await
        {
            Some(outcome) => outcome,
            None => {
                info!(work_item_id = %id, attempt, "item locked by another job, deferring");
                self.decider
                    .decide(attempt, format!("{id} is being processed by another job"))
            }
        }
    }

    async fn process_unlocked(&self, id: WorkItemId, attempt: u32) -> JobOutcome {
        let mut record = None;
        match self.run(id, &mut record).await {
            Ok(Progress::AlreadyCompleted) => {
                debug!(work_item_id = %id, "already completed, nothing to do");
                JobOutcome::Success
            }
            Ok(Progress::Completed(aggregates)) => {
                info!(
                    work_item_id = %id,
                    attempt,
                    avg_metric = aggregates.avg_metric,
                    max_metric = aggregates.max_metric,
                    "item completed"
                );
                JobOutcome::Success
            }
            Err(err) => self.fail(id, record, attempt, err).await,
        }
    }

    /// Steps 1-5. `slot` receives the record as soon as it exists so the
    /// failure path can mark it.
    async fn run(
        &self,
        id: WorkItemId,
        slot: &mut Option<ProcessingResult>,
    ) -> Result<Progress, StoreError> {
        let (record, created) = self.results.get_or_create(id).await?;
        if record.is_completed() {
            return Ok(Progress::AlreadyCompleted);
        }
        if !created && record.status == ResultStatus::Processing {
            warn!(work_item_id = %id, "record was left in processing, taking it over");
        }

        let record = slot.insert(record);
        record.start_processing(self.clock.now())?;
        self.results.save(record).await?;

        let aggregates = self.aggregates.aggregate(id).await?;

        // keep the slot at Processing until the terminal write has landed
        let mut done = record.clone();
        done.mark_completed(aggregates, self.clock.now())?;
        self.results.save(&done).await?;
        *record = done;

        Ok(Progress::Completed(aggregates))
    }

    async fn fail(
        &self,
        id: WorkItemId,
        record: Option<ProcessingResult>,
        attempt: u32,
        err: StoreError,
    ) -> JobOutcome {
        let reason = err.to_string();

        if let Some(mut record) = record {
            match record.mark_failed(reason.clone(), self.clock.now()) {
                Ok(()) => {
                    if let Err(save_err) = self.results.save(&record).await {
                        warn!(work_item_id = %id, error = %save_err, "could not persist failed status");
                    }
                }
                Err(transition) => {
                    warn!(work_item_id = %id, error = %transition, "could not mark failed");
                }
            }
        }

        let outcome = self.decider.decide(attempt, reason);
        match &outcome {
            JobOutcome::RetryableFailure { reason, delay } => warn!(
                work_item_id = %id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %reason,
                "item processing failed, retry scheduled"
            ),
            JobOutcome::PermanentFailure { reason } => error!(
                work_item_id = %id,
                attempt,
                error = %reason,
                "item processing failed permanently"
            ),
            JobOutcome::Success => {}
        }
        outcome
    }
}

#[async_trait]
impl Handler<ProcessItemJob> for ItemProcessor {
    async fn handle(&self, job: ProcessItemJob, ctx: JobContext) -> JobOutcome {
        self.process_item(job.work_item_id, ctx.attempt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BackoffPolicy;
    use crate::impls::{InMemoryCoordinationStore, InMemoryWorkoutStore};
    use crate::ports::SystemClock;

    const W1: WorkItemId = WorkItemId::new(1);
    const W2: WorkItemId = WorkItemId::new(2);
    const W3: WorkItemId = WorkItemId::new(3);

    async fn setup() -> (ItemProcessor, Arc<InMemoryWorkoutStore>) {
        let store = Arc::new(InMemoryWorkoutStore::new());
        store.add_workout(W1, vec![60, 70, 80]).await;
        store.add_workout(W2, Vec::new()).await;
        store.add_workout(W3, Vec::new()).await;
        let processor = ItemProcessor::new(
            store.clone(),
            store.clone(),
            RetryDecider::new(BackoffPolicy::default()),
            Arc::new(SystemClock),
        );
        (processor, store)
    }

    #[tokio::test]
    async fn completes_with_aggregates() {
        let (processor, store) = setup().await;

        let outcome = processor.process_item(W1, 0).await;
        assert_eq!(outcome, JobOutcome::Success);

        let r = store.get(W1).await.unwrap().unwrap();
        assert_eq!(r.status, ResultStatus::Completed);
        assert_eq!(r.avg_metric, Some(70.0));
        assert_eq!(r.max_metric, Some(80));
        assert_eq!(r.error_message, None);
        assert_eq!(r.attempts, 1);
    }

    #[tokio::test]
    async fn completed_item_is_never_written_again() {
        let (processor, store) = setup().await;
        processor.process_item(W1, 0).await;
        let writes = store.write_count();
        let before = store.get(W1).await.unwrap();

        for attempt in 0..5 {
            assert_eq!(processor.process_item(W1, attempt).await, JobOutcome::Success);
        }
        assert_eq!(store.write_count(), writes);
        assert_eq!(store.get(W1).await.unwrap(), before);
    }

    #[tokio::test]
    async fn missing_samples_fail_and_retry() {
        let (processor, store) = setup().await;

        let outcome = processor.process_item(W2, 0).await;
        let JobOutcome::RetryableFailure { reason, delay } = outcome else {
            panic!("expected retryable failure, got {outcome:?}");
        };
        assert!(reason.contains("no samples"));
        assert!(delay <= Duration::from_secs(10));

        let r = store.get(W2).await.unwrap().unwrap();
        assert_eq!(r.status, ResultStatus::Failed);
        assert!(!r.error_message.unwrap().is_empty());
        assert_eq!(r.avg_metric, None);
    }

    #[tokio::test]
    async fn exhausted_attempts_leave_item_failed() {
        let (processor, store) = setup().await;

        for attempt in 0..3 {
            assert!(matches!(
                processor.process_item(W3, attempt).await,
                JobOutcome::RetryableFailure { .. }
            ));
        }
        let outcome = processor.process_item(W3, 3).await;
        assert!(matches!(outcome, JobOutcome::PermanentFailure { .. }));

        let r = store.get(W3).await.unwrap().unwrap();
        assert_eq!(r.status, ResultStatus::Failed);
        assert_eq!(r.attempts, 4);
    }

    #[tokio::test]
    async fn failed_item_recovers_on_retry() {
        let (processor, store) = setup().await;
        store.fail_next_aggregates(1);

        assert!(matches!(
            processor.process_item(W1, 0).await,
            JobOutcome::RetryableFailure { .. }
        ));
        assert_eq!(store.get(W1).await.unwrap().unwrap().status, ResultStatus::Failed);

        assert_eq!(processor.process_item(W1, 1).await, JobOutcome::Success);
        let r = store.get(W1).await.unwrap().unwrap();
        assert_eq!(r.status, ResultStatus::Completed);
        assert_eq!(r.error_message, None);
    }

    #[tokio::test]
    async fn failure_before_record_exists_writes_nothing() {
        let (processor, store) = setup().await;
        store.fail_next_creates(1);

        let outcome = processor.process_item(W1, 0).await;
        assert!(matches!(outcome, JobOutcome::RetryableFailure { .. }));
        assert_eq!(store.write_count(), 0);
        assert!(store.get(W1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_creation_failure_leaves_item_stuck_pending() {
        let (processor, store) = setup().await;
        // first Processing write and the Failed write both fail
        store.fail_next_saves(2);

        let outcome = processor.process_item(W1, 0).await;
        assert!(matches!(outcome, JobOutcome::RetryableFailure { .. }));

        let r = store.get(W1).await.unwrap().unwrap();
        assert_eq!(r.status, ResultStatus::Pending);
        // the record exists, so discovery no longer sees the item
        let unprocessed = store.list_unprocessed_ids().await.unwrap();
        assert!(!unprocessed.contains(&W1));
        assert_eq!(store.counts_by_status().await.stuck(), 1);
    }

    #[tokio::test]
    async fn redelivery_takes_over_stuck_processing_record() {
        let (processor, store) = setup().await;
        // a previous worker died right after the Processing write
        let (mut r, _) = store.get_or_create(W1).await.unwrap();
        r.start_processing(chrono::Utc::now()).unwrap();
        store.save(&r).await.unwrap();

        assert_eq!(processor.process_item(W1, 0).await, JobOutcome::Success);
        let r = store.get(W1).await.unwrap().unwrap();
        assert_eq!(r.status, ResultStatus::Completed);
        assert_eq!(r.attempts, 2);
    }

    #[tokio::test]
    async fn failed_terminal_write_marks_item_failed() {
        let (processor, store) = setup().await;
        store.fail_next_completions(1);

        let outcome = processor.process_item(W1, 0).await;
        assert!(matches!(outcome, JobOutcome::RetryableFailure { .. }));
        let r = store.get(W1).await.unwrap().unwrap();
        assert_eq!(r.status, ResultStatus::Failed);
        assert_eq!(r.avg_metric, None);

        assert_eq!(processor.process_item(W1, 1).await, JobOutcome::Success);
        assert_eq!(
            store.get(W1).await.unwrap().unwrap().status,
            ResultStatus::Completed
        );
    }

    #[tokio::test]
    async fn item_lock_defers_duplicate_delivery() {
        let (processor, store) = setup().await;
        let locks = LockService::new(Arc::new(InMemoryCoordinationStore::new()));
        let ttl = Duration::from_secs(600);
        let processor = processor.with_item_lock(locks.clone(), ttl);

        let held = locks
            .try_acquire(&ItemProcessor::item_lock_name(W1), ttl)
            .await
            .unwrap();
        let outcome = processor.process_item(W1, 0).await;
        assert!(matches!(outcome, JobOutcome::RetryableFailure { .. }));
        assert_eq!(store.write_count(), 0);

        held.release().await;
        assert_eq!(processor.process_item(W1, 1).await, JobOutcome::Success);
        assert_eq!(
            store.get(W1).await.unwrap().unwrap().status,
            ResultStatus::Completed
        );
    }

    #[tokio::test]
    async fn handler_uses_delivery_attempt() {
        let (processor, _) = setup().await;
        let ctx = JobContext {
            job_id: crate::domain::JobId::generate(),
            attempt: 3,
        };
        let outcome = processor
            .handle(ProcessItemJob { work_item_id: W2 }, ctx)
            .await;
        assert!(matches!(outcome, JobOutcome::PermanentFailure { .. }));
    }
}
