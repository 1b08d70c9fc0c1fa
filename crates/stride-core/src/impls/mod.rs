//! Impls - port implementations.
//!
//! # Included
//! - **InMemoryCoordinationStore**: lock backend for tests and single-process runs
//! - **InMemoryJobQueue**: job transport with delayed retries and late ack
//! - **InMemoryWorkoutStore**: workouts, samples and results
//! - **RedisCoordinationStore** (`redis` feature): production lock backend

pub mod inmem_coordination;
pub mod inmem_queue;
pub mod inmem_store;
#[cfg(feature = "redis")]
pub mod redis_coordination;

pub use self::inmem_coordination::InMemoryCoordinationStore;
pub use self::inmem_queue::{InMemoryJobQueue, RetryRecord};
pub use self::inmem_store::InMemoryWorkoutStore;
#[cfg(feature = "redis")]
pub use self::redis_coordination::RedisCoordinationStore;
