//! App - application layer.
//!
//! Combines the ports into the running system.
//!
//! # Components
//! - **LockService**: named TTL leases over the coordination store
//! - **DispatchCycle** / **Scheduler**: periodic discovery and fan-out
//! - **ItemProcessor**: per-item state machine, the `ProcessItemJob` handler
//! - **WorkerGroup**: pop -> handle -> retry/ack loop
//! - **WorkerAppBuilder**: wiring and startup validation

pub mod builder;
pub mod dispatcher;
pub mod lock_service;
pub mod processor;
pub mod scheduler;
pub mod worker_loop;

pub use self::builder::{BuildError, RunningApp, WorkerApp, WorkerAppBuilder};
pub use self::dispatcher::{DispatchConfig, DispatchCycle, DispatchError, DispatchReport};
pub use self::lock_service::{LockGuard, LockService};
pub use self::processor::{ItemProcessor, ProcessItemJob};
pub use self::scheduler::Scheduler;
pub use self::worker_loop::{WorkerGroup, execute_one};
