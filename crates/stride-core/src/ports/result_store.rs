//! ResultStore port - persistence of per-item processing results.
//!
//! There is no row lock. The only discipline is "read status, branch,
//! write status"; callers tolerate concurrent writers on the same row.

use async_trait::async_trait;

use crate::domain::{ProcessingResult, StoreError, WorkItemId};

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Fetch the record for `id`, creating a Pending one if absent.
    /// The flag tells whether it was created by this call. Fetching an
    /// existing record performs no write.
    async fn get_or_create(&self, id: WorkItemId) -> Result<(ProcessingResult, bool), StoreError>;

    /// Upsert the record.
    async fn save(&self, result: &ProcessingResult) -> Result<(), StoreError>;

    async fn get(&self, id: WorkItemId) -> Result<Option<ProcessingResult>, StoreError>;
}
