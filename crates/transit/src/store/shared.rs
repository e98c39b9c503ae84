//! Thread-safe handle over a single store.
//!
//! Readers share the lock and see a consistent snapshot; each write holds
//! the lock for the whole check-and-apply sequence, so writers serialize.

use std::sync::{Arc, PoisonError, RwLock};

use super::TransitStore;
use crate::models::types::Result;

/// Cheap to clone; all clones refer to the same store.
#[derive(Clone, Debug, Default)]
pub struct SharedTransitStore {
    inner: Arc<RwLock<TransitStore>>,
}

impl SharedTransitStore {
    pub fn new(store: TransitStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Run a read-only closure against the current state.
    pub fn read<T>(&self, f: impl FnOnce(&TransitStore) -> T) -> T {
        // Mutations never leave the store half-applied, so a poisoned lock
        // still guards consistent data.
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }

    /// Run a single mutation under the write lock.
    pub fn write<T>(&self, f: impl FnOnce(&mut TransitStore) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }

    /// Run several mutations atomically; see [`TransitStore::transaction`].
    pub fn transaction<T>(&self, f: impl FnOnce(&mut TransitStore) -> Result<T>) -> Result<T> {
        self.write(|store| store.transaction(f))
    }

    /// An owned copy of the current state.
    pub fn snapshot(&self) -> TransitStore {
        self.read(TransitStore::clone)
    }
}
