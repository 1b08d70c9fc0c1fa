//! InMemoryJobQueue - development/test job transport.
//!
//! Mirrors the broker semantics the core relies on:
//! - ready queue + min-heap of delayed retries
//! - late ack: popped jobs stay in flight until acked
//! - `requeue_in_flight()` simulates a worker crash (unacked jobs are
//!   redelivered, attempt unchanged)
//!
//! The mutex is never held across an await outside this module.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::{JobEnvelope, JobId, JobRequest, QueueError};
use crate::ports::JobQueue;

/// Delayed job entry; reversed ordering turns `BinaryHeap` into a min-heap.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledJob {
    deliver_at: Instant,
    job_id: JobId,
}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deliver_at
            .cmp(&self.deliver_at)
            .then_with(|| other.job_id.cmp(&self.job_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Ready,
    Scheduled,
    InFlight,
}

#[derive(Debug)]
struct Entry {
    envelope: JobEnvelope,
    slot: Slot,
}

/// One `retry` call, kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryRecord {
    pub job_id: JobId,
    /// Attempt number of the resubmitted job.
    pub attempt: u32,
    pub delay: Duration,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<JobId, Entry>,
    ready: VecDeque<JobId>,
    scheduled: BinaryHeap<ScheduledJob>,
    retries: Vec<RetryRecord>,
    submitted: usize,
}

impl QueueState {
    /// Move delayed jobs whose time has come to the ready queue.
    fn promote_scheduled(&mut self, now: Instant) {
        while let Some(entry) = self.scheduled.peek() {
            if entry.deliver_at > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            if let Some(job) = self.jobs.get_mut(&entry.job_id)
                && job.slot == Slot::Scheduled
            {
                job.slot = Slot::Ready;
                self.ready.push_back(entry.job_id);
            }
        }
    }

    fn take_ready(&mut self) -> Option<JobEnvelope> {
        while let Some(job_id) = self.ready.pop_front() {
            if let Some(job) = self.jobs.get_mut(&job_id)
                && job.slot == Slot::Ready
            {
                job.slot = Slot::InFlight;
                return Some(job.envelope.clone());
            }
        }
        None
    }
}

pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    failing_submits: AtomicU32,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            failing_submits: AtomicU32::new(0),
        }
    }

    /// Make the next `n` submissions fail with `Unavailable`.
    pub fn fail_next_submits(&self, n: u32) {
        self.failing_submits.store(n, Ordering::SeqCst);
    }

    /// Redeliver every popped-but-unacked job. Returns how many.
    pub async fn requeue_in_flight(&self) -> usize {
        let count = {
            let mut state = self.state.lock().await;
            let ids: Vec<JobId> = state
                .jobs
                .iter()
                .filter(|(_, e)| e.slot == Slot::InFlight)
                .map(|(id, _)| *id)
                .collect();
            for id in &ids {
                if let Some(job) = state.jobs.get_mut(id) {
                    job.slot = Slot::Ready;
                }
                state.ready.push_back(*id);
            }
            ids.len()
        };
        if count > 0 {
            self.notify.notify_waiters();
        }
        count
    }

    pub async fn submitted_count(&self) -> usize {
        self.state.lock().await.submitted
    }

    pub async fn retries(&self) -> Vec<RetryRecord> {
        self.state.lock().await.retries.clone()
    }

    /// Jobs waiting for delivery (ready or delayed).
    pub async fn pending_count(&self) -> usize {
        let state = self.state.lock().await;
        state
            .jobs
            .values()
            .filter(|e| e.slot != Slot::InFlight)
            .count()
    }

    pub async fn in_flight_count(&self) -> usize {
        let state = self.state.lock().await;
        state
            .jobs
            .values()
            .filter(|e| e.slot == Slot::InFlight)
            .count()
    }

    /// Nothing ready, delayed or in flight.
    pub async fn is_drained(&self) -> bool {
        self.state.lock().await.jobs.is_empty()
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn submit(&self, request: JobRequest) -> Result<JobId, QueueError> {
        let armed = self
            .failing_submits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            return Err(QueueError::Unavailable("submit switched off".to_string()));
        }

        let job_id = JobId::generate();
        {
            let mut state = self.state.lock().await;
            state.jobs.insert(
                job_id,
                Entry {
                    envelope: JobEnvelope::new(job_id, request),
                    slot: Slot::Ready,
                },
            );
            state.ready.push_back(job_id);
            state.submitted += 1;
        }
        self.notify.notify_one();
        Ok(job_id)
    }

    async fn retry(&self, job: &JobEnvelope, delay: Duration) -> Result<(), QueueError> {
        let next = job.next_attempt();
        {
            let mut state = self.state.lock().await;
            state.retries.push(RetryRecord {
                job_id: next.job_id(),
                attempt: next.attempt(),
                delay,
            });
            state.scheduled.push(ScheduledJob {
                deliver_at: Instant::now() + delay,
                job_id: next.job_id(),
            });
            state.jobs.insert(
                next.job_id(),
                Entry {
                    envelope: next,
                    slot: Slot::Scheduled,
                },
            );
        }
        // wake a waiter so it re-arms its timer on the new deadline
        self.notify.notify_one();
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<JobEnvelope>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            let next_wake = {
                let mut state = self.state.lock().await;
                state.promote_scheduled(Instant::now());
                if let Some(envelope) = state.take_ready() {
                    return Ok(Some(envelope));
                }
                state.scheduled.peek().map(|e| e.deliver_at)
            };

            if Instant::now() >= deadline {
                return Ok(None);
            }
            let wake = next_wake.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = self.notify.notified() => {},
                _ = tokio::time::sleep_until(wake) => {},
            }
        }
    }

    async fn ack(&self, job_id: JobId) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        match state.jobs.get(&job_id).map(|e| e.slot) {
            Some(Slot::InFlight) => {
                state.jobs.remove(&job_id);
                Ok(())
            }
            // resubmitted by `retry` before the ack of the failed delivery
            Some(Slot::Scheduled) | Some(Slot::Ready) => Ok(()),
            None => Err(QueueError::UnknownJob(job_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobType;

    fn request(n: u64) -> JobRequest {
        JobRequest::new(JobType::new("test"), serde_json::json!({ "n": n }))
    }

    #[tokio::test]
    async fn submit_pop_ack() {
        let queue = InMemoryJobQueue::new();
        let id = queue.submit(request(1)).await.unwrap();

        let job = queue.pop(Duration::from_millis(100)).await.unwrap().unwrap();
        assert_eq!(job.job_id(), id);
        assert_eq!(job.attempt(), 0);
        assert_eq!(queue.in_flight_count().await, 1);

        queue.ack(id).await.unwrap();
        assert!(queue.is_drained().await);
        assert!(matches!(
            queue.ack(id).await,
            Err(QueueError::UnknownJob(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn pop_times_out_when_empty() {
        let queue = InMemoryJobQueue::new();
        let start = Instant::now();
        let popped = queue.pop(Duration::from_millis(500)).await.unwrap();
        assert_eq!(popped, None);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_is_delivered_after_delay_with_next_attempt() {
        let queue = InMemoryJobQueue::new();
        let id = queue.submit(request(1)).await.unwrap();
        let job = queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();

        queue.retry(&job, Duration::from_secs(30)).await.unwrap();
        queue.ack(job.job_id()).await.unwrap();

        // not yet
        assert_eq!(queue.pop(Duration::from_secs(29)).await.unwrap(), None);

        let again = queue.pop(Duration::from_secs(5)).await.unwrap().unwrap();
        assert_eq!(again.job_id(), id);
        assert_eq!(again.attempt(), 1);

        let retries = queue.retries().await;
        assert_eq!(
            retries,
            vec![RetryRecord {
                job_id: id,
                attempt: 1,
                delay: Duration::from_secs(30),
            }]
        );
    }

    #[tokio::test]
    async fn unacked_jobs_are_redelivered_after_crash() {
        let queue = InMemoryJobQueue::new();
        let id = queue.submit(request(1)).await.unwrap();
        let _lost = queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();

        assert_eq!(queue.requeue_in_flight().await, 1);
        let again = queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(again.job_id(), id);
        assert_eq!(again.attempt(), 0);
    }

    #[tokio::test]
    async fn push_wakes_waiting_pop() {
        let queue = std::sync::Arc::new(InMemoryJobQueue::new());
        let waiter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.pop(Duration::from_secs(5)).await.unwrap() }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let id = queue.submit(request(7)).await.unwrap();

        let popped = waiter.await.unwrap().unwrap();
        assert_eq!(popped.job_id(), id);
    }

    #[tokio::test]
    async fn injected_submit_failure() {
        let queue = InMemoryJobQueue::new();
        queue.fail_next_submits(1);
        assert!(queue.submit(request(1)).await.is_err());
        assert!(queue.submit(request(2)).await.is_ok());
        assert_eq!(queue.submitted_count().await, 1);
    }
}
