//! Ports - interfaces to the external collaborators.
//!
//! Each trait hides one outside system:
//! - `CoordinationStore`: atomic set-if-absent with TTL (Redis)
//! - `AggregationStore` / `ResultStore`: the relational workout store
//! - `JobQueue`: the job transport
//! - `Clock`: wall-clock time
//!
//! Handles are created once at process start and passed in as
//! `Arc<dyn Port>`. Nothing here is a global.

pub mod aggregation_store;
pub mod clock;
pub mod coordination_store;
pub mod job_queue;
pub mod result_store;

pub use self::aggregation_store::AggregationStore;
pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::coordination_store::CoordinationStore;
pub use self::job_queue::JobQueue;
pub use self::result_store::ResultStore;
