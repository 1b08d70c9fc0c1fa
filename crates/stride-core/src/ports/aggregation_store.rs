//! AggregationStore port - read side of the workout store.

use async_trait::async_trait;

use crate::domain::{Aggregates, StoreError, WorkItemId};

#[async_trait]
pub trait AggregationStore: Send + Sync {
    /// Items with no result record at all. Order unspecified.
    ///
    /// An item whose record exists in any status (Pending, Processing,
    /// Failed) is not listed, so a record stuck in Pending or Processing is
    /// never rediscovered by a later scan.
    async fn list_unprocessed_ids(&self) -> Result<Vec<WorkItemId>, StoreError>;

    /// Average and maximum over the item's samples.
    /// `StoreError::NotFound` when the item has no samples.
    async fn aggregate(&self, id: WorkItemId) -> Result<Aggregates, StoreError>;
}
