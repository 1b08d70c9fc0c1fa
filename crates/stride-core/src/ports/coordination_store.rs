//! CoordinationStore port - the shared key-value store backing the locks.
//!
//! The only correctness-critical primitive of the whole system is
//! `set_if_absent`: an atomic conditional write with a TTL
//! (`SET key value NX PX ttl` on Redis).

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::CoordinationError;

#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Write `key = value` only if no live entry exists. The entry expires
    /// after `ttl`. Returns whether the write happened.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CoordinationError>;

    /// Delete `key` only if it still holds `value`. Returns whether a live
    /// entry was deleted.
    async fn delete_if_equals(&self, key: &str, value: &str) -> Result<bool, CoordinationError>;
}
