// ── Generic reactive entity collection ──
//
// Lock-free concurrent storage with O(1) lookups by id and a cached,
// id-ordered snapshot rebuilt on every mutation.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::{Entity, EntityId};

/// A lock-free collection for a single entity type.
///
/// Uses `DashMap` for concurrent lookups and a `watch` channel holding the
/// current snapshot. Snapshots are sorted by id so readers always see
/// entities in persisted order.
pub(crate) struct EntityCollection<T: Entity> {
    by_id: DashMap<EntityId, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Entity> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or replace an entity. Returns the previous value, if any.
    pub(crate) fn upsert(&self, entity: T) -> Option<Arc<T>> {
        let previous = self.by_id.insert(entity.id(), Arc::new(entity));
        self.rebuild_snapshot();
        self.bump_version();
        previous
    }

    /// Remove an entity by id. Returns the removed entity if it existed.
    pub(crate) fn remove(&self, id: EntityId) -> Option<Arc<T>> {
        let removed = self.by_id.remove(&id).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_snapshot();
            self.bump_version();
        }
        removed
    }

    pub(crate) fn get(&self, id: EntityId) -> Option<Arc<T>> {
        self.by_id.get(&id).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, id: EntityId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Current snapshot, ordered by id (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<T>> = self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by_key(|v| v.id());
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}
