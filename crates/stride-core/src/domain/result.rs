//! Processing result record: one per work item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregate::Aggregates;
use super::errors::InvalidTransition;
use super::ids::WorkItemId;
use super::status::ResultStatus;

/// Per-item result row.
///
/// Design:
/// - Keyed uniquely by `work_item_id` (at most one result per item).
/// - All status changes go through the transition methods, which check
///   `ResultStatus::can_transition_to`. A Completed record rejects every
///   change.
/// - Metrics are populated only when Completed, `error_message` only when
///   Failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub work_item_id: WorkItemId,
    pub status: ResultStatus,
    pub avg_metric: Option<f64>,
    pub max_metric: Option<i64>,
    pub error_message: Option<String>,
    pub processed_at: DateTime<Utc>,

    /// Number of times this record entered Processing.
    #[serde(default)]
    pub attempts: u32,
}

impl ProcessingResult {
    /// A fresh Pending record.
    pub fn pending(work_item_id: WorkItemId, now: DateTime<Utc>) -> Self {
        Self {
            work_item_id,
            status: ResultStatus::Pending,
            avg_metric: None,
            max_metric: None,
            error_message: None,
            processed_at: now,
            attempts: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ResultStatus::Completed
    }

    /// Mark as processing (clears a previous failure).
    pub fn start_processing(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.transition(ResultStatus::Processing)?;
        self.error_message = None;
        self.attempts += 1;
        self.processed_at = now;
        Ok(())
    }

    /// Mark as completed with the computed aggregates. Irreversible.
    pub fn mark_completed(
        &mut self,
        aggregates: Aggregates,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        self.transition(ResultStatus::Completed)?;
        self.avg_metric = Some(aggregates.avg_metric);
        self.max_metric = Some(aggregates.max_metric);
        self.error_message = None;
        self.processed_at = now;
        Ok(())
    }

    /// Mark as failed with a human-readable reason.
    pub fn mark_failed(
        &mut self,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        self.transition(ResultStatus::Failed)?;
        self.error_message = Some(error.into());
        self.processed_at = now;
        Ok(())
    }

    fn transition(&mut self, next: ResultStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                work_item_id: self.work_item_id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
