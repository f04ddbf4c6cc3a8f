//! Per-resource advisory locking.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

/// Serializes operations that share a key; different keys never wait on each other.
///
/// Waiters for one key are served in arrival order. Entries are created on
/// first use and dropped again once nobody holds or waits for them.
pub struct KeyedMutex<K> {
    locks: LockMap<K>,
}

/// Held while an exclusive operation runs; releases (and garbage-collects) on drop.
struct Lease<K: Eq + Hash + Clone> {
    guard: Option<OwnedMutexGuard<()>>,
    lock: Arc<AsyncMutex<()>>,
    key: K,
    locks: LockMap<K>,
}

impl<K: Eq + Hash + Clone> Drop for Lease<K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock();
        // One reference in the map, one in this lease: nobody else is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedMutex<K> {
    /// Create an empty guard table.
    pub fn new() -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `operation` once every earlier operation on `key` has finished.
    ///
    /// The result (success or error) of `operation` is returned untouched; the
    /// key is released on every exit path, including cancellation.
    pub async fn run_exclusive<F, T>(&self, key: K, operation: F) -> T
    where
        F: Future<Output = T>,
    {
        let _lease = self.acquire(key).await;
        operation.await
    }

    async fn acquire(&self, key: K) -> Lease<K> {
        let lock = self
            .locks
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let guard = lock.clone().lock_owned().await;
        Lease {
            guard: Some(guard),
            lock,
            key,
            locks: self.locks.clone(),
        }
    }

    /// Whether an operation currently holds or waits for `key`.
    pub fn is_busy(&self, key: &K) -> bool {
        self.locks.lock().contains_key(key)
    }

    /// Number of keys with an operation in flight.
    pub fn active_keys(&self) -> usize {
        self.locks.lock().len()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedMutex<K> {
    fn default() -> Self {
        Self::new()
    }
}
