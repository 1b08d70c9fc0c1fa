//! LockService - named, TTL-bounded mutual exclusion.
//!
//! Provides:
//! - non-blocking acquisition through the store's atomic set-if-absent
//! - a random holder token per acquisition; release deletes only if the key
//!   still holds that token
//! - TTL expiry as the crash-recovery path (a dead holder blocks others for
//!   at most `ttl`)
//!
//! Store errors never escape: an unreachable store reads as "lock not
//! obtained", so work is skipped rather than run twice.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use ulid::Ulid;

use crate::ports::CoordinationStore;

#[derive(Clone)]
pub struct LockService {
    store: Arc<dyn CoordinationStore>,
}

impl LockService {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    /// Storage key of the lock called `name`.
    pub fn key_for(name: &str) -> String {
        format!("lock:{name}")
    }

    /// Try once to take `name` for `ttl`. Never waits.
    pub async fn try_acquire(&self, name: &str, ttl: Duration) -> Option<LockGuard> {
        let key = Self::key_for(name);
        let token = Ulid::new().to_string();

        match self.store.set_if_absent(&key, &token, ttl).await {
            Ok(true) => {
                debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "lock acquired");
                Some(LockGuard {
                    store: Arc::clone(&self.store),
                    key,
                    token,
                    released: false,
                })
            }
            Ok(false) => {
                debug!(key = %key, "lock held elsewhere");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "coordination store error, lock not acquired");
                None
            }
        }
    }

    /// Release a handle that may not exist. Safe to call unconditionally on
    /// a cleanup path.
    pub async fn release(&self, handle: Option<LockGuard>) {
        if let Some(guard) = handle {
            guard.release().await;
        }
    }

    /// Scoped acquisition: run `f` only while holding `name`, release on
    /// the way out. `None` when the lock was not obtained.
    ///
    /// If the future is dropped mid-flight the guard's drop still releases.
    pub async fn with_lock<F, Fut, T>(&self, name: &str, ttl: Duration, f: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.try_acquire(name, ttl).await?;
        let out = f().await;
        guard.release().await;
        Some(out)
    }
}

/// A held lease.
///
/// Released by `release().await`; when dropped without it (panic, early
/// return, cancelled future) a best-effort release is spawned on the
/// current tokio runtime. The TTL covers the case where even that fails.
pub struct LockGuard {
    store: Arc<dyn CoordinationStore>,
    key: String,
    token: String,
    released: bool,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Holder token written under the key.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub async fn release(mut self) {
        self.released = true;
        match self.store.delete_if_equals(&self.key, &self.token).await {
            Ok(true) => debug!(key = %self.key, "lock released"),
            Ok(false) => {
                warn!(key = %self.key, "lock release skipped: lease expired or taken over")
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "lock release failed, will expire via TTL")
            }
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.key, "lock guard dropped outside a runtime, will expire via TTL");
            return;
        };

        let store = Arc::clone(&self.store);
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        handle.spawn(async move {
            match store.delete_if_equals(&key, &token).await {
                Ok(_) => debug!(key = %key, "lock released on drop"),
                Err(e) => debug!(key = %key, error = %e, "lock release on drop failed"),
            }
        });
    }
}
