//! Domain identifiers (strongly-typed IDs).
//!
//! Two kinds of identity flow through the system:
//! - `WorkItemId`: the store's numeric key of a workout. The core never looks
//!   past it.
//! - `JobId`: ULID of one queued job. A job keeps its id across retries, so
//!   the id names "the processing of one item", not a single delivery.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of a work item (a workout row in the external store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(u64);

impl WorkItemId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for WorkItemId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "workout-{}", self.0)
    }
}

/// Identifier of a queued job.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Ulid);

impl JobId {
    /// Fresh id, sortable by creation time.
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for JobId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_item_id_serializes_as_bare_number() {
        let id = WorkItemId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");

        let back: WorkItemId = serde_json::from_str("42").unwrap();
        assert_eq!(back, id);
        assert_eq!(id.to_string(), "workout-42");
    }

    #[test]
    fn job_ids_are_unique_and_prefixed() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("job-"));
    }

    #[test]
    fn job_id_keeps_its_ulid() {
        let ulid = Ulid::new();
        let id: JobId = ulid.into();
        assert_eq!(id.as_ulid(), ulid);
        // same size as the raw ULID
        assert_eq!(std::mem::size_of::<JobId>(), 16);
    }
}
