//! Pending conflict bookkeeping.
//!
//! Holds conflicts awaiting manual resolution, keyed by entity. Pure
//! bookkeeping: the coordinator batch-replays entries on reconnect, and
//! the UI lists them for manual decisions. Safe for concurrent use.

use std::collections::HashMap;
use tillsync_types::{EntityKey, PendingConflict};
use tokio::sync::RwLock;

/// Concurrent store of unresolved conflicts.
#[derive(Debug, Default)]
pub struct PendingConflictStore {
    entries: RwLock<HashMap<EntityKey, PendingConflict>>,
}

impl PendingConflictStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a conflict, replacing any previous entry for the entity.
    pub async fn add(&self, pending: PendingConflict) {
        self.entries
            .write()
            .await
            .insert(pending.key().clone(), pending);
    }

    /// Returns the parked conflict for an entity, if any.
    pub async fn get(&self, key: &EntityKey) -> Option<PendingConflict> {
        self.entries.read().await.get(key).cloned()
    }

    /// Removes and returns the parked conflict for an entity.
    pub async fn remove(&self, key: &EntityKey) -> Option<PendingConflict> {
        self.entries.write().await.remove(key)
    }

    /// Returns all parked conflicts.
    pub async fn all(&self) -> Vec<PendingConflict> {
        self.entries.read().await.values().cloned().collect()
    }

    /// Number of parked conflicts.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
