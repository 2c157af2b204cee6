//! Per-key exclusive locks for structural tree mutations.
//!
//! A full rescan and a directory hydration for the same workspace both mutate
//! the shared tree across await points; the registry serializes them. This is
//! an ordering lock, not a data-race guard — the execution model is
//! single-threaded cooperative.
//!
//! The registry is an explicit service instance passed to whoever needs it;
//! there is no ambient global map, so lifetime and test isolation stay
//! visible. Handoff is FIFO: `tokio::sync::Mutex` is fair and wakes waiters
//! in request order, and the RAII guard releases on drop even if the holder
//! panics, so there is no hand-written unlock path to get wrong.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held for the duration of one structural mutation.
pub type WorkspaceGuard = OwnedMutexGuard<()>;

#[derive(Default)]
pub struct LockRegistry {
    locks: SyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the exclusive lock for `key`, waiting FIFO behind any current
    /// holder and earlier waiters.
    pub async fn lock(&self, key: &str) -> WorkspaceGuard {
        let entry = {
            let mut locks = self.locks.lock();
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }

    /// Number of keys ever locked; for tests and diagnostics.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}
