//! DispatchCycle - periodic discovery and fan-out.
//!
//! One cycle:
//! 1. take `lock:process_all_workouts` (skip the cycle if held elsewhere)
//! 2. list items without a result record
//! 3. submit one `ProcessItemJob` per item
//! 4. release the lock
//!
//! A failed submission is logged and counted; the item stays unprocessed
//! and is picked up again next cycle.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::lock_service::LockService;
use super::processor::ProcessItemJob;
use crate::domain::{QueueError, StoreError, WorkItemId};
use crate::ports::{AggregationStore, JobQueue};
use crate::typed::Job;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub lock_name: String,
    pub lock_ttl: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            lock_name: "process_all_workouts".to_string(),
            lock_ttl: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchReport {
    /// Another cycle held the lock.
    Skipped,
    Dispatched {
        listed: usize,
        submitted: usize,
        failed: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("listing unprocessed items failed: {0}")]
    Listing(#[source] StoreError),
}

pub struct DispatchCycle {
    locks: LockService,
    store: Arc<dyn AggregationStore>,
    queue: Arc<dyn JobQueue>,
    config: DispatchConfig,
}

impl DispatchCycle {
    pub fn new(
        locks: LockService,
        store: Arc<dyn AggregationStore>,
        queue: Arc<dyn JobQueue>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            locks,
            store,
            queue,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run one cycle. The lock is released whether or not listing succeeds.
    pub async fn run_once(&self) -> Result<DispatchReport, DispatchError> {
        let ran = self
            .locks
            .with_lock(&self.config.lock_name, self.config.lock_ttl, || {
                self.dispatch_all()
            })
            .await;

        match ran {
            Some(report) => report,
            None => {
                info!(lock = %self.config.lock_name, "dispatch cycle already running, skipping");
                Ok(DispatchReport::Skipped)
            }
        }
    }

    async fn dispatch_all(&self) -> Result<DispatchReport, DispatchError> {
        let ids = self
            .store
            .list_unprocessed_ids()
            .await
            .map_err(DispatchError::Listing)?;

        let listed = ids.len();
        let mut submitted = 0;
        let mut failed = 0;
        for id in ids {
            match self.submit(id).await {
                Ok(()) => submitted += 1,
                Err(e) => {
                    failed += 1;
                    warn!(work_item_id = %id, error = %e, "job submission failed");
                }
            }
        }

        if listed == 0 {
            debug!("no unprocessed items");
        } else {
            info!(listed, submitted, failed, "dispatch cycle finished");
        }
        Ok(DispatchReport::Dispatched {
            listed,
            submitted,
            failed,
        })
    }

    async fn submit(&self, id: WorkItemId) -> Result<(), QueueError> {
        let request = ProcessItemJob { work_item_id: id }.to_request()?;
        let job_id = self.queue.submit(request).await?;
        debug!(work_item_id = %id, job_id = %job_id, "job submitted");
        Ok(())
    }
}
