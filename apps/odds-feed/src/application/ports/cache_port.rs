//! Reference Cache Port
//!
//! Lookup-or-insert storage keyed by (identifier, language). The default
//! adapter never evicts; a bounded LRU adapter can be swapped in without
//! touching stage logic.

use std::sync::Arc;

/// Concurrent reference cache.
pub trait ReferenceCache<K, V>: Send + Sync {
    /// Cached value, if present.
    fn get(&self, key: &K) -> Option<V>;

    /// Insert or overwrite a value.
    fn insert(&self, key: K, value: V);

    /// Number of entries.
    fn len(&self) -> usize;

    /// True when empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared, type-erased cache handle.
pub type SharedCache<K, V> = Arc<dyn ReferenceCache<K, V>>;
