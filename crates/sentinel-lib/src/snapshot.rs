//! Atomically replaceable immutable snapshots
//!
//! Readers take an `Arc` of the current value and work on it without holding
//! any lock; writers install a complete replacement. In-flight requests keep
//! the snapshot they started with.

use std::sync::{Arc, RwLock};

pub struct SnapshotCell<T> {
    current: RwLock<Arc<T>>,
}

impl<T> SnapshotCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
        }
    }

    /// Current snapshot
    pub fn load(&self) -> Arc<T> {
        // The guarded value is a plain Arc, so a poisoned lock still holds a
        // complete snapshot.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Install a new snapshot, returning the previous one
    pub fn store(&self, value: T) -> Arc<T> {
        let next = Arc::new(value);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, next)
    }
}

impl<T: Default> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
