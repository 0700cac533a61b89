//! Small TTL map shared by the catalog's search and stats caches.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

/// Key → value map whose entries stop being served once `ttl` has elapsed
/// since insertion.
///
/// Expired entries are invisible to [`get`](Self::get) immediately but only
/// reclaimed by [`sweep`](Self::sweep). Concurrent inserts for the same key
/// are last-writer-wins.
///
/// Timestamps come from `tokio::time::Instant` so tests can drive expiry with
/// a paused clock.
#[derive(Debug)]
pub struct ExpiringCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, (V, Instant)>>,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read();
        let (value, inserted) = entries.get(key)?;
        if inserted.elapsed() < self.ttl {
            Some(value.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.write().insert(key, (value, Instant::now()));
    }

    /// Return the fresh value for `key` or compute, store and return a new one.
    ///
    /// `compute` runs without holding the lock, so two callers racing on a
    /// cold key may both compute; the later insert wins.
    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let value = compute();
        self.insert(key, value.clone());
        value
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let ttl = self.ttl;
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, (_, inserted)| inserted.elapsed() < ttl);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
