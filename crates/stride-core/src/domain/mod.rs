//! Domain model (ids, result records, outcomes, retry policy, errors).

pub mod aggregate;
pub mod decision;
pub mod errors;
pub mod ids;
pub mod job;
pub mod outcome;
pub mod result;
pub mod retry;
pub mod status;

pub use aggregate::Aggregates;
pub use decision::RetryDecider;
pub use errors::{CoordinationError, InvalidTransition, QueueError, StoreError};
pub use ids::{JobId, WorkItemId};
pub use job::{JobEnvelope, JobRequest, JobType};
pub use outcome::JobOutcome;
pub use result::ProcessingResult;
pub use retry::BackoffPolicy;
pub use status::{ResultStatus, StatusParseError};
