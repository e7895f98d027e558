//! Bounded, insertion-ordered store of cached records.
//!
//! Eviction is FIFO: when a collection is full, the record inserted first is
//! dropped, regardless of how recently it was read or merged. Inserting a key
//! that is already present merges into the live record instead of replacing
//! it, so handles held elsewhere stay valid.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::trace;

use crate::CacheError;
use crate::config::{Capacities, Capacity};
use crate::entity::{Cached, Entity, Scope};

/// Result of an upsert.
#[derive(Debug)]
pub struct Upserted<E: Entity> {
    /// The live record (or a transient one if the collection retains nothing).
    pub entity: Cached<E>,
    /// Snapshot taken just before the merge, when the key was already cached.
    pub previous: Option<E>,
    /// Whether the record is held by the collection after the call.
    pub retained: bool,
}

impl<E: Entity> Upserted<E> {
    /// True when the record did not exist before.
    pub fn is_new(&self) -> bool {
        self.previous.is_none()
    }
}

/// Capacity-limited map of records keyed by [`Entity::Key`].
pub struct Collection<E: Entity> {
    entries: RwLock<IndexMap<E::Key, Cached<E>>>,
    capacity: Capacity,
    /// Handed to records built here so they can size their own stores.
    capacities: Arc<Capacities>,
}

impl<E: Entity> Collection<E> {
    /// Create a collection sized by the configured capacity for `E`.
    pub fn new(capacities: &Arc<Capacities>) -> Self {
        Self::with_capacity(capacities.get(E::KIND), capacities)
    }

    /// Create a collection with an explicit capacity.
    pub fn with_capacity(capacity: Capacity, capacities: &Arc<Capacities>) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            capacity,
            capacities: Arc::clone(capacities),
        }
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Get a record by key.
    pub fn get(&self, key: &E::Key) -> Option<Cached<E>> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &E::Key) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Merge a payload into the cached record, or construct and insert one.
    ///
    /// The existence check, merge and insert happen under one write lock, so
    /// concurrent upserts of one key never produce two live records.
    pub fn upsert(&self, raw: E::Raw, scope: &Scope) -> Result<Upserted<E>, CacheError> {
        let key = E::raw_key(&raw, scope)
            .ok_or_else(|| CacheError::malformed(E::KIND.as_str(), "payload has no id"))?;

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&key) {
            let previous = existing.snapshot();
            existing.merge(raw);
            trace!(kind = %E::KIND, key = %key, "cache: merged");
            return Ok(Upserted {
                entity: existing.clone(),
                previous: Some(previous),
                retained: true,
            });
        }

        let entity = Cached::new(E::construct(raw, scope)?, &self.capacities);
        let retained = self.insert_locked(&mut entries, key, entity.clone());
        Ok(Upserted {
            entity,
            previous: None,
            retained,
        })
    }

    /// Insert a payload only if its key is not cached yet.
    ///
    /// Returns the live record either way. Used for background registration,
    /// where a fetched payload must never overwrite newer state.
    pub fn get_or_insert(&self, raw: E::Raw, scope: &Scope) -> Result<Cached<E>, CacheError> {
        let key = E::raw_key(&raw, scope)
            .ok_or_else(|| CacheError::malformed(E::KIND.as_str(), "payload has no id"))?;

        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&key) {
            return Ok(existing.clone());
        }
        let entity = Cached::new(E::construct(raw, scope)?, &self.capacities);
        self.insert_locked(&mut entries, key, entity.clone());
        Ok(entity)
    }

    /// Build a record without consulting or touching the collection.
    pub fn transient(&self, raw: E::Raw, scope: &Scope) -> Result<Cached<E>, CacheError> {
        Ok(Cached::new(E::construct(raw, scope)?, &self.capacities))
    }

    /// Remove a record, returning it if it was cached.
    pub fn remove(&self, key: &E::Key) -> Option<Cached<E>> {
        let removed = self.entries.write().shift_remove(key);
        if removed.is_some() {
            trace!(kind = %E::KIND, key = %key, "cache: removed");
        }
        removed
    }

    /// Handles to every record, in insertion order.
    pub fn values(&self) -> Vec<Cached<E>> {
        self.entries.read().values().cloned().collect()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<E::Key> {
        self.entries.read().keys().cloned().collect()
    }

    /// Snapshots of every record, in insertion order.
    pub fn snapshots(&self) -> Vec<E> {
        self.entries.read().values().map(Cached::snapshot).collect()
    }

    /// First record matching a predicate.
    pub fn find(&self, mut predicate: impl FnMut(&E) -> bool) -> Option<Cached<E>> {
        self.entries
            .read()
            .values()
            .find(|entry| predicate(&entry.read()))
            .cloned()
    }

    /// Records matching a predicate, in insertion order.
    pub fn filter(&self, mut predicate: impl FnMut(&E) -> bool) -> Vec<Cached<E>> {
        self.entries
            .read()
            .values()
            .filter(|entry| predicate(&entry.read()))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn insert_locked(
        &self,
        entries: &mut IndexMap<E::Key, Cached<E>>,
        key: E::Key,
        entity: Cached<E>,
    ) -> bool {
        match self.capacity {
            Capacity::Limit(0) => {
                trace!(kind = %E::KIND, key = %key, "cache: capacity is zero, not retained");
                return false;
            }
            Capacity::Limit(limit) => {
                while entries.len() >= limit {
                    if let Some((evicted, _)) = entries.shift_remove_index(0) {
                        trace!(kind = %E::KIND, key = %evicted, "cache: evicted oldest");
                    }
                }
            }
            Capacity::Unbounded => {}
        }
        entries.insert(key.clone(), entity);
        trace!(kind = %E::KIND, key = %key, "cache: inserted");
        true
    }
}

impl<E: Entity> fmt::Debug for Collection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("kind", &E::KIND)
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CalendarComment, RawCalendarComment};
    use serde_json::json;

    fn comment(id: u64, content: &str) -> RawCalendarComment {
        serde_json::from_value(json!({
            "id": id,
            "content": content,
            "createdAt": "2024-01-01T00:00:00Z",
            "calendarEventId": 42,
            "channelId": "c1",
            "createdBy": "u1"
        }))
        .unwrap()
    }

    fn collection(capacity: Capacity) -> Collection<CalendarComment> {
        Collection::with_capacity(capacity, &Arc::new(Capacities::default()))
    }

    #[test]
    fn test_fifo_eviction_keeps_newest() {
        let comments = collection(Capacity::Limit(2));
        for id in 1..=3 {
            comments.upsert(comment(id, "hi"), &Scope::default()).unwrap();
        }

        assert_eq!(comments.keys(), vec![2, 3]);
        assert!(comments.get(&1).is_none());
    }

    #[test]
    fn test_access_does_not_refresh_order() {
        let comments = collection(Capacity::Limit(2));
        comments.upsert(comment(1, "a"), &Scope::default()).unwrap();
        comments.upsert(comment(2, "b"), &Scope::default()).unwrap();

        // Reading and merging 1 must not protect it from eviction
        let _ = comments.get(&1);
        comments.upsert(comment(1, "a2"), &Scope::default()).unwrap();
        comments.upsert(comment(3, "c"), &Scope::default()).unwrap();

        assert_eq!(comments.keys(), vec![2, 3]);
    }

    #[test]
    fn test_upsert_preserves_identity() {
        let comments = collection(Capacity::Unbounded);
        let first = comments.upsert(comment(1, "before"), &Scope::default()).unwrap();
        assert!(first.is_new());

        let partial: RawCalendarComment =
            serde_json::from_value(json!({"id": 1, "content": "after"})).unwrap();
        let second = comments.upsert(partial, &Scope::default()).unwrap();

        assert!(first.entity.ptr_eq(&second.entity));
        assert_eq!(second.previous.unwrap().content, "before");
        let now = second.entity.snapshot();
        assert_eq!(now.content, "after");
        assert_eq!(now.channel_id, "c1");
        assert_eq!(now.member_id, "u1");
    }

    #[test]
    fn test_zero_capacity_is_transient() {
        let comments = collection(Capacity::Limit(0));
        let result = comments.upsert(comment(1, "hi"), &Scope::default()).unwrap();

        assert!(!result.retained);
        assert_eq!(result.entity.snapshot().content, "hi");
        assert!(comments.is_empty());
    }

    #[test]
    fn test_remove_returns_entity() {
        let comments = collection(Capacity::Unbounded);
        comments.upsert(comment(1, "hi"), &Scope::default()).unwrap();

        let removed = comments.remove(&1).unwrap();
        assert_eq!(removed.snapshot().id, 1);
        assert!(comments.remove(&1).is_none());
        assert!(comments.get(&1).is_none());
    }

    #[test]
    fn test_get_or_insert_does_not_overwrite() {
        let comments = collection(Capacity::Unbounded);
        comments.upsert(comment(1, "newer"), &Scope::default()).unwrap();

        let kept = comments.get_or_insert(comment(1, "older"), &Scope::default()).unwrap();
        assert_eq!(kept.snapshot().content, "newer");
    }

    #[test]
    fn test_missing_key_is_malformed() {
        let comments = collection(Capacity::Unbounded);
        let raw: RawCalendarComment = serde_json::from_value(json!({"content": "x"})).unwrap();
        let err = comments.upsert(raw, &Scope::default()).unwrap_err();
        assert!(matches!(err, CacheError::MalformedEvent { .. }));
    }

    #[test]
    fn test_values_is_restartable() {
        let comments = collection(Capacity::Unbounded);
        for id in [5, 3, 9] {
            comments.upsert(comment(id, "x"), &Scope::default()).unwrap();
        }

        let values = comments.values();
        let first: Vec<u64> = values.iter().map(|c| c.read().id).collect();
        let second: Vec<u64> = values.iter().map(|c| c.read().id).collect();
        assert_eq!(first, vec![5, 3, 9]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_concurrent_upserts_same_key() {
        use std::thread;

        let comments = Arc::new(collection(Capacity::Unbounded));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let comments = Arc::clone(&comments);
                thread::spawn(move || {
                    for j in 0..50 {
                        comments
                            .upsert(comment(7, &format!("t{}_{}", i, j)), &Scope::default())
                            .unwrap();
                    }
                    comments.get(&7).unwrap()
                })
            })
            .collect();

        let seen: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(comments.len(), 1);
        for handle in &seen[1..] {
            assert!(handle.ptr_eq(&seen[0]));
        }
    }
}
