//! In-flight check registry
//!
//! Tracks which check ids have been admitted and not yet finished. Admission
//! is a single insert-if-absent under the lock, and every successful insert
//! hands back an [`InFlightEntry`] whose drop removes the id again.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::domain::CheckId;

/// Set of check ids currently in flight
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    running: Arc<Mutex<HashSet<CheckId>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `id` unless it is already in flight
    ///
    /// Returns `None` when another admission for the same id is still live.
    pub fn try_insert(&self, id: CheckId) -> Option<InFlightEntry> {
        let inserted = self.lock().insert(id);
        debug!(%id, inserted, "InFlightRegistry::try_insert: called");
        inserted.then(|| InFlightEntry {
            id,
            registry: self.clone(),
        })
    }

    pub fn contains(&self, id: CheckId) -> bool {
        self.lock().contains(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Ids in flight, sorted
    pub fn ids(&self) -> Vec<CheckId> {
        let mut ids: Vec<_> = self.lock().iter().copied().collect();
        ids.sort();
        ids
    }

    fn remove(&self, id: CheckId) {
        let removed = self.lock().remove(&id);
        debug!(%id, removed, "InFlightRegistry::remove: called");
    }

    // A panic while holding the lock cannot leave the set half-updated, so a
    // poisoned lock is still safe to use and cleanup must not be skipped.
    fn lock(&self) -> MutexGuard<'_, HashSet<CheckId>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof of admission for one check id
///
/// Dropping it removes the id from the registry.
#[derive(Debug)]
#[must_use = "dropping the entry immediately releases the admission"]
pub struct InFlightEntry {
    id: CheckId,
    registry: InFlightRegistry,
}

impl InFlightEntry {
    pub fn id(&self) -> CheckId {
        self.id
    }
}

impl Drop for InFlightEntry {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
