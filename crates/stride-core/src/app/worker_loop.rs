//! WorkerGroup - job execution loop.
//!
//! Each worker runs pop -> handle -> report:
//! - `Success` -> ack
//! - `RetryableFailure` -> resubmit with the delay, then ack
//! - `PermanentFailure` / unknown job type -> log, ack
//!
//! A job is acked only after its outcome has been handed to the queue, so a
//! worker that dies mid-job leaves the job for redelivery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::{JobEnvelope, JobOutcome};
use crate::ports::JobQueue;
use crate::typed::JobRegistry;

/// Worker group handle.
/// - `request_shutdown()` stops every worker after its current job
/// - `shutdown_and_join()` also waits for them
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers polling `queue` with `poll_timeout`.
    pub fn spawn(
        n: usize,
        queue: Arc<dyn JobQueue>,
        registry: Arc<JobRegistry>,
        poll_timeout: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let reg = Arc::clone(&registry);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, q, reg, poll_timeout, &mut rx).await;
            });
            joins.push(join);
        }

        info!(workers = n, "worker group started");
        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Does not cancel running handlers; workers stop taking new jobs.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            if let Err(e) = j.await {
                error!(error = %e, "worker task panicked");
            }
        }
        info!("worker group stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<dyn JobQueue>,
    registry: Arc<JobRegistry>,
    poll_timeout: Duration,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // pop may wait, so race it against shutdown
        let popped = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            popped = queue.pop(poll_timeout) => popped,
        };

        let job = match popped {
            Ok(Some(job)) => job,
            Ok(None) => continue,
            Err(e) => {
                warn!(worker_id, error = %e, "queue pop failed");
                tokio::time::sleep(poll_timeout).await;
                continue;
            }
        };

        debug!(worker_id, job_id = %job.job_id(), job_type = %job.job_type(), attempt = job.attempt(), "job received");
        execute_one(queue.as_ref(), &registry, &job).await;
    }
    debug!(worker_id, "worker stopped");
}

/// Run one delivered job and hand its outcome back to the queue.
pub async fn execute_one(
    queue: &dyn JobQueue,
    registry: &JobRegistry,
    job: &JobEnvelope,
) -> JobOutcome {
    let outcome = match registry.get(job.job_type().as_str()) {
        Some(handler) => handler.handle_dyn(job).await,
        None => JobOutcome::permanent(format!("no handler for job type '{}'", job.job_type())),
    };

    match &outcome {
        JobOutcome::Success => ack(queue, job).await,
        JobOutcome::RetryableFailure { delay, .. } => match queue.retry(job, *delay).await {
            Ok(()) => ack(queue, job).await,
            Err(e) => {
                // left unacked: the transport redelivers it
                error!(job_id = %job.job_id(), error = %e, "retry submission failed");
            }
        },
        JobOutcome::PermanentFailure { reason } => {
            error!(
                job_id = %job.job_id(),
                job_type = %job.job_type(),
                attempt = job.attempt(),
                error = %reason,
                "job failed permanently"
            );
            ack(queue, job).await;
        }
    }
    outcome
}

async fn ack(queue: &dyn JobQueue, job: &JobEnvelope) {
    if let Err(e) = queue.ack(job.job_id()).await {
        warn!(job_id = %job.job_id(), error = %e, "ack failed");
    }
}
