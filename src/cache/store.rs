//! Store Module
//!
//! The map-like contract every backing store of a throttled function satisfies.

use std::collections::HashMap;

use crate::key::CacheKey;

// == Store Trait ==
/// Map-equivalent key-value store used to hold cache entries.
///
/// The throttled function performs no capacity management on a store: a
/// bounded store such as [`LruCache`](crate::cache::LruCache) evicts on its
/// own, a plain `HashMap` grows until entries expire.
///
/// Implementations are expected to behave like a map. A store that violates
/// this contract (e.g. `get` returning something other than what was `set`)
/// yields unspecified caching behavior, not a panic.
pub trait Store<V>: Send {
    /// Membership test. Must not change recency.
    fn has(&self, key: &CacheKey) -> bool;

    /// Returns a clone of the value stored under `key`.
    fn get(&mut self, key: &CacheKey) -> Option<V>;

    /// Returns a clone of the value stored under `key` without changing
    /// recency.
    ///
    /// Defaults to None ("cannot look without touching"), in which case
    /// callers fall back to [`get`](Self::get).
    fn peek(&self, _key: &CacheKey) -> Option<V> {
        None
    }

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: CacheKey, value: V);

    /// Removes `key`. Returns whether a value was present.
    fn delete(&mut self, key: &CacheKey) -> bool;

    /// Removes every key.
    fn clear(&mut self);
}

impl<V> Store<V> for HashMap<CacheKey, V>
where
    V: Clone + Send,
{
    fn has(&self, key: &CacheKey) -> bool {
        self.contains_key(key)
    }

    fn get(&mut self, key: &CacheKey) -> Option<V> {
        HashMap::get(self, key).cloned()
    }

    fn peek(&self, key: &CacheKey) -> Option<V> {
        HashMap::get(self, key).cloned()
    }

    fn set(&mut self, key: CacheKey, value: V) {
        self.insert(key, value);
    }

    fn delete(&mut self, key: &CacheKey) -> bool {
        self.remove(key).is_some()
    }

    fn clear(&mut self) {
        HashMap::clear(self);
    }
}
