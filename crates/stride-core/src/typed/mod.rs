//! Typed job API: `Job` payloads, `Handler<T>`, and the registry that
//! erases them for the worker loop.

pub mod handler;
pub mod job;
pub mod registry;

pub use self::handler::{DynHandler, Handler, JobContext, TypedHandler};
pub use self::job::Job;
pub use self::registry::{JobRegistry, RegistryError};
