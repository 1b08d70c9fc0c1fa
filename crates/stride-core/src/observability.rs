use serde::{Deserialize, Serialize};

use crate::domain::{ProcessingResult, ResultStatus};

/// Snapshot of result records by status.
///
/// `unprocessed` counts items without any record (what the next dispatch
/// cycle would pick up). `pending + processing` is the stuck-item signal:
/// those items are invisible to discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCounts {
    pub unprocessed: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl ResultCounts {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ProcessingResult>) -> Self {
        let mut counts = Self::default();
        for r in results {
            match r.status {
                ResultStatus::Pending => counts.pending += 1,
                ResultStatus::Processing => counts.processing += 1,
                ResultStatus::Completed => counts.completed += 1,
                ResultStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn stuck(&self) -> usize {
        self.pending + self.processing
    }
}
