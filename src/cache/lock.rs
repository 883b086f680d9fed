//! Per-key async locks
//!
//! Used for single-flight upstream fetches and serialized cache writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Idle locks are pruned once the map grows past this size
const PRUNE_THRESHOLD: usize = 1024;

/// A map of keys to async mutexes
#[derive(Debug, Default)]
pub struct KeyLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if map.len() > PRUNE_THRESHOLD {
                map.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
