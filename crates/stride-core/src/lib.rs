//! stride-core
//!
//! Periodic workout aggregation over a job queue.
//!
//! # Modules
//! - **domain**: ids, result records, status machine, outcomes, backoff policy, errors
//! - **ports**: coordination store, aggregation/result stores, job queue, clock
//! - **app**: lock service, dispatch cycle, item processor, worker loop, builder
//! - **typed**: typed job API (`Job`, `Handler`, `JobRegistry`)
//! - **impls**: in-memory ports and the Redis coordination store
//! - **config**: `StrideConfig`
//! - **observability**: status counts

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod typed;
