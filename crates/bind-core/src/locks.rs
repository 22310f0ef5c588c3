//! Per-key exclusive sections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per key so lookup-then-write sequences on the
/// same logical id run one at a time while unrelated ids proceed in parallel.
#[derive(Default)]
pub struct KeyedLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. The section ends when the guard
    /// is dropped.
    pub async fn lock(&self, key: impl Into<String>) -> OwnedMutexGuard<()> {
        let key = key.into();
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Entries nobody holds or waits on are dropped as we go.
            locks.retain(|k, m| k == &key || Arc::strong_count(m) > 1);
            Arc::clone(locks.entry(key).or_default())
        };
        mutex.lock_owned().await
    }

    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
