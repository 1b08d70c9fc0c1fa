//! Error types shared across ports and components.
//!
//! Classification:
//! - `CoordinationError`: the lock backend is unreachable. The lock service
//!   turns it into "did not get the lock".
//! - `StoreError`: anything the item processor can hit. All variants are
//!   recorded on the result record and retried.
//! - `QueueError`: submission/ack failures of the job transport.

use thiserror::Error;

use super::ids::{JobId, WorkItemId};
use super::status::{ResultStatus, StatusParseError};

/// A status change the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid status transition for {work_item_id}: {from} -> {to}")]
pub struct InvalidTransition {
    pub work_item_id: WorkItemId,
    pub from: ResultStatus,
    pub to: ResultStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinationError {
    #[error("coordination store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The item has no measurements, so no average exists.
    #[error("no samples found for {0}")]
    NotFound(WorkItemId),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("corrupted record: {0}")]
    Corrupted(#[from] StatusParseError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("job queue unavailable: {0}")]
    Unavailable(String),

    #[error("unknown job {0}")]
    UnknownJob(JobId),

    #[error("payload encode failed: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_item() {
        let err = StoreError::NotFound(WorkItemId::new(2));
        assert_eq!(err.to_string(), "no samples found for workout-2");
    }

    #[test]
    fn corrupted_status_converts_into_store_error() {
        let err: StoreError = "done".parse::<ResultStatus>().unwrap_err().into();
        assert!(matches!(err, StoreError::Corrupted(_)));
        assert!(err.to_string().contains("done"));
    }
}
