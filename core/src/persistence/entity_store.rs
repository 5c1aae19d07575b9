//! Generic per-entity store (C8 "entity store" half).
//!
//! Each entity kind (Agent, Wallet, Escrow, Task, RateLimitBucket, Tool) gets
//! its own `EntityStore<T>`. The actor-model idea — "a hash of `entity_id`
//! selects a worker thread; a per-entity inbox serializes mutations" — is
//! realized here without a message-passing runtime: each key owns its own
//! `Mutex<T>`, so two calls touching the *same* id are serialized by lock
//! acquisition order while calls touching *different* ids never contend.
//! A keyed `BTreeMap` of ids to entities, generalized with the lock each
//! key needs to be safely shared across threads.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A keyed store giving every entity its own lock.
///
/// `T` must be `Clone` so that [`EntityStore::snapshot`] can hand back a
/// point-in-time copy without holding the per-key lock for the caller's
/// entire read ("reads are non-locking snapshots").
#[derive(Debug)]
pub struct EntityStore<T> {
    entries: Mutex<BTreeMap<String, Arc<Mutex<T>>>>,
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<T> EntityStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a brand new entity. Overwrites any existing lock cell for
    /// this id — callers must ensure ids are fresh (ids are UUIDs).
    pub fn insert(&self, id: impl Into<String>, value: T) {
        let mut entries = self.entries.lock().expect("entity store poisoned");
        entries.insert(id.into(), Arc::new(Mutex::new(value)));
    }

    /// Run `f` with exclusive access to the entity at `id`, returning `None`
    /// if no such entity exists. This is the *only* way to mutate an entity:
    /// the lock is held for the duration of `f`, so cross-step invariants
    /// (e.g. "check balance, then debit") are atomic within one call.
    pub fn with_mut<R>(&self, id: &str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let cell = {
            let entries = self.entries.lock().expect("entity store poisoned");
            entries.get(id).cloned()
        }?;
        let mut guard: MutexGuard<'_, T> = cell.lock().expect("per-entity lock poisoned");
        Some(f(&mut guard))
    }

    /// Whether an entity with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        let entries = self.entries.lock().expect("entity store poisoned");
        entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().expect("entity store poisoned");
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> EntityStore<T> {
    /// Take a consistent point-in-time clone of the entity at `id`.
    /// Never blocks on a concurrent writer beyond the brief lock needed to
    /// clone (balance queries "never block on concurrent writes").
    pub fn snapshot(&self, id: &str) -> Option<T> {
        let cell = {
            let entries = self.entries.lock().expect("entity store poisoned");
            entries.get(id).cloned()
        }?;
        let guard = cell.lock().expect("per-entity lock poisoned");
        Some(guard.clone())
    }

    /// Snapshot every entity currently in the store. Used by reconciliation
    /// sweeps and tests; not on any hot path.
    pub fn snapshot_all(&self) -> Vec<T> {
        let ids: Vec<String> = {
            let entries = self.entries.lock().expect("entity store poisoned");
            entries.keys().cloned().collect()
        };
        ids.into_iter().filter_map(|id| self.snapshot(&id)).collect()
    }
}
