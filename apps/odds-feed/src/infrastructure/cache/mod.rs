//! Reference Caches
//!
//! In-memory adapters for the reference cache port. The unbounded cache
//! never evicts; reference data is small and stable for the lifetime of a
//! session. The LRU cache bounds memory for long-running processes that
//! see many distinct events.

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use clru::CLruCache;
use parking_lot::Mutex;

use crate::application::ports::{ReferenceCache, SharedCache};
use crate::infrastructure::config::CachePolicy;

/// Cache that keeps every entry.
#[derive(Debug)]
pub struct UnboundedCache<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K, V> UnboundedCache<K, V> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for UnboundedCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ReferenceCache<K, V> for UnboundedCache<K, V>
where
    K: Eq + Hash + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    fn insert(&self, key: K, value: V) {
        self.entries.lock().insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Cache that evicts the least recently used entry beyond its capacity.
pub struct LruCache<K, V> {
    entries: Mutex<CLruCache<K, V>>,
}

impl<K: Eq + Hash, V> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(CLruCache::new(capacity)),
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.lock().capacity()
    }
}

impl<K, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache").finish_non_exhaustive()
    }
}

impl<K, V> ReferenceCache<K, V> for LruCache<K, V>
where
    K: Eq + Hash + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    fn insert(&self, key: K, value: V) {
        self.entries.lock().put(key, value);
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Build a cache for `policy`.
///
/// An LRU capacity of zero falls back to one entry.
#[must_use]
pub fn cache_for<K, V>(policy: CachePolicy) -> SharedCache<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
{
    match policy {
        CachePolicy::Unbounded => Arc::new(UnboundedCache::new()),
        CachePolicy::Lru(capacity) => {
            let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
            Arc::new(LruCache::new(capacity))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_keeps_everything() {
        let cache = UnboundedCache::new();
        for i in 0..1000 {
            cache.insert((i, "en"), i * 2);
        }
        assert_eq!(cache.len(), 1000);
        assert_eq!(cache.get(&(10, "en")), Some(20));
        assert_eq!(cache.get(&(10, "de")), None);
    }

    #[test]
    fn insert_overwrites() {
        let cache = UnboundedCache::new();
        cache.insert("sr:match:1", 1);
        cache.insert("sr:match:1", 2);
        assert_eq!(cache.get(&"sr:match:1"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let cache = LruCache::new(NonZeroUsize::new(2).unwrap());
        cache.insert(1, "a");
        cache.insert(2, "b");
        assert_eq!(cache.get(&1), Some("a"));
        cache.insert(3, "c");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&1), Some("a"));
        assert_eq!(cache.get(&3), Some("c"));
    }

    #[test]
    fn factory_follows_policy() {
        let unbounded: SharedCache<u32, u32> = cache_for(CachePolicy::Unbounded);
        let bounded: SharedCache<u32, u32> = cache_for(CachePolicy::Lru(0));
        for i in 0..5 {
            unbounded.insert(i, i);
            bounded.insert(i, i);
        }
        assert_eq!(unbounded.len(), 5);
        assert_eq!(bounded.len(), 1);
        assert!(!bounded.is_empty());
    }
}
