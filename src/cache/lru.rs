//! LRU Cache Module
//!
//! Bounded key-value store with Least Recently Used eviction.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use tracing::trace;

use crate::cache::Store;
use crate::key::CacheKey;

// == LRU Cache ==
/// Fixed-capacity map that evicts the least recently used key.
///
/// Recency is tracked in a VecDeque where:
/// - Front = Least recently used (next eviction candidate)
/// - Back = Most recently used
///
/// Every key in `storage` appears exactly once in `queue` and vice versa.
#[derive(Debug)]
pub struct LruCache<K, V> {
    /// Key-value storage
    storage: HashMap<K, V>,
    /// Order of keys by access time
    queue: VecDeque<K>,
    /// Maximum number of entries, None = never evict
    capacity: Option<usize>,
    /// Number of keys evicted so far
    evictions: u64,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates an LRU cache holding at most `capacity` entries.
    ///
    /// A capacity of zero or `usize::MAX` disables eviction entirely.
    pub fn new(capacity: usize) -> Self {
        let capacity = (capacity != 0 && capacity != usize::MAX).then_some(capacity);

        Self {
            storage: HashMap::new(),
            queue: VecDeque::new(),
            capacity,
            evictions: 0,
        }
    }

    // == Hit ==
    /// Marks `key` as most recently used.
    ///
    /// A key already tracked moves to the back of the queue. A new key is
    /// appended, and if the queue then exceeds capacity the front key is
    /// evicted from both the queue and the storage.
    fn hit(&mut self, key: &K) {
        if let Some(idx) = self.queue.iter().position(|k| k == key) {
            if let Some(existing) = self.queue.remove(idx) {
                self.queue.push_back(existing);
            }
            return;
        }

        self.queue.push_back(key.clone());

        if let Some(capacity) = self.capacity {
            if self.queue.len() > capacity {
                if let Some(evicted) = self.queue.pop_front() {
                    self.storage.remove(&evicted);
                    self.evictions += 1;
                    trace!(evictions = self.evictions, "LRU eviction");
                }
            }
        }
    }

    // == Has ==
    /// Checks membership without touching recency.
    pub fn contains(&self, key: &K) -> bool {
        self.storage.contains_key(key)
    }

    // == Get ==
    /// Returns the value for `key`, promoting it to most recently used.
    ///
    /// A miss returns None and leaves the cache untouched.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.storage.contains_key(key) {
            self.hit(key);
        }
        self.storage.get(key)
    }

    // == Insert ==
    /// Inserts or replaces `key` as most recently used.
    ///
    /// Returns the previous value stored under `key`, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.hit(&key);
        self.storage.insert(key, value)
    }

    // == Remove ==
    /// Removes `key` from both the storage and the recency queue.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        if let Some(idx) = self.queue.iter().position(|k| k == key) {
            self.queue.remove(idx);
        }
        self.storage.remove(key)
    }

    // == Clear ==
    /// Empties the cache. The eviction counter is kept.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.storage.clear();
    }

    // == Peek Oldest ==
    /// Returns the next eviction candidate without removing it.
    #[cfg(test)]
    pub(crate) fn peek_oldest(&self) -> Option<&K> {
        self.queue.front()
    }

    // == Length ==
    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Returns the configured capacity, None when eviction is disabled.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Returns how many keys have been evicted since creation.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    #[cfg(test)]
    pub(crate) fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

impl<V> Store<V> for LruCache<CacheKey, V>
where
    V: Clone + Send,
{
    fn has(&self, key: &CacheKey) -> bool {
        self.contains(key)
    }

    fn get(&mut self, key: &CacheKey) -> Option<V> {
        LruCache::get(self, key).cloned()
    }

    fn peek(&self, key: &CacheKey) -> Option<V> {
        self.storage.get(key).cloned()
    }

    fn set(&mut self, key: CacheKey, value: V) {
        self.insert(key, value);
    }

    fn delete(&mut self, key: &CacheKey) -> bool {
        self.remove(key).is_some()
    }

    fn clear(&mut self) {
        LruCache::clear(self);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: usize, keys: &[&str]) -> LruCache<String, usize> {
        let mut lru = LruCache::new(capacity);
        for (i, key) in keys.iter().enumerate() {
            lru.insert((*key).to_string(), i);
        }
        lru
    }

    #[test]
    fn test_lru_new() {
        let lru: LruCache<String, u32> = LruCache::new(3);
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.capacity(), Some(3));
    }

    #[test]
    fn test_lru_insert_and_get() {
        let mut lru = filled(3, &["key1", "key2"]);

        assert_eq!(lru.get(&"key1".to_string()), Some(&0));
        assert_eq!(lru.get(&"key2".to_string()), Some(&1));
        assert_eq!(lru.get(&"missing".to_string()), None);
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn test_lru_evicts_oldest_on_overflow() {
        let mut lru = filled(3, &["key1", "key2", "key3", "key4"]);

        assert_eq!(lru.len(), 3);
        assert!(!lru.contains(&"key1".to_string()));
        assert!(lru.contains(&"key4".to_string()));
        assert_eq!(lru.evictions(), 1);
        assert_eq!(lru.peek_oldest(), Some(&"key2".to_string()));
    }

    #[test]
    fn test_lru_get_promotes_key() {
        let mut lru = filled(3, &["key1", "key2", "key3"]);

        // Access key1 to make it most recently used
        lru.get(&"key1".to_string());
        lru.insert("key4".to_string(), 4);

        assert!(lru.contains(&"key1".to_string()));
        assert!(!lru.contains(&"key2".to_string()));
    }

    #[test]
    fn test_lru_has_does_not_promote() {
        let mut lru = filled(2, &["a", "b"]);

        assert!(lru.contains(&"a".to_string()));
        lru.insert("c".to_string(), 2);

        assert!(!lru.contains(&"a".to_string()));
    }

    #[test]
    fn test_lru_miss_does_not_mutate() {
        let mut lru = filled(2, &["a", "b"]);

        assert_eq!(lru.get(&"zzz".to_string()), None);
        assert_eq!(lru.queue_len(), 2);
        assert_eq!(lru.peek_oldest(), Some(&"a".to_string()));
    }

    #[test]
    fn test_lru_overwrite_does_not_evict() {
        let mut lru = filled(2, &["a", "b"]);

        assert_eq!(lru.insert("a".to_string(), 10), Some(0));

        assert_eq!(lru.len(), 2);
        assert_eq!(lru.evictions(), 0);
        // a moved to the back, b is now oldest
        assert_eq!(lru.peek_oldest(), Some(&"b".to_string()));
    }

    #[test]
    fn test_lru_remove_drops_recency() {
        let mut lru = filled(3, &["a", "b", "c"]);

        assert_eq!(lru.remove(&"a".to_string()), Some(0));
        assert_eq!(lru.queue_len(), 2);

        lru.insert("d".to_string(), 3);
        lru.insert("e".to_string(), 4);

        // b is evicted, not a phantom entry for a
        assert!(!lru.contains(&"b".to_string()));
        assert_eq!(lru.len(), 3);
        assert_eq!(lru.queue_len(), 3);
    }

    #[test]
    fn test_lru_remove_nonexistent_key() {
        let mut lru = filled(3, &["key1", "key2"]);

        assert_eq!(lru.remove(&"nonexistent".to_string()), None);
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn test_lru_clear() {
        let mut lru = filled(3, &["a", "b", "c"]);

        lru.clear();

        assert!(lru.is_empty());
        assert_eq!(lru.queue_len(), 0);
        assert_eq!(lru.peek_oldest(), None);
    }

    #[test]
    fn test_lru_unbounded_never_evicts() {
        let mut lru = LruCache::new(usize::MAX);
        for i in 0..1000 {
            lru.insert(i, i);
        }

        assert_eq!(lru.len(), 1000);
        assert_eq!(lru.evictions(), 0);
        assert_eq!(lru.capacity(), None);
    }

    #[test]
    fn test_lru_zero_capacity_disables_eviction() {
        let lru: LruCache<u32, u32> = LruCache::new(0);
        assert_eq!(lru.capacity(), None);
    }

    #[test]
    fn test_lru_order_after_multiple_touches() {
        let mut lru = filled(3, &["a", "b", "c"]);

        // queue: [a, b, c] -> touch a, c, b -> [a, c, b]
        lru.get(&"a".to_string());
        lru.get(&"c".to_string());
        lru.get(&"b".to_string());

        lru.insert("d".to_string(), 3);
        assert!(!lru.contains(&"a".to_string()));
        lru.insert("e".to_string(), 4);
        assert!(!lru.contains(&"c".to_string()));
        lru.insert("f".to_string(), 5);
        assert!(!lru.contains(&"b".to_string()));
    }

    #[test]
    fn test_lru_as_store() {
        let mut lru: LruCache<CacheKey, u32> = LruCache::new(2);

        Store::set(&mut lru, CacheKey::from("a"), 1);
        assert!(Store::has(&lru, &CacheKey::from("a")));
        assert_eq!(Store::get(&mut lru, &CacheKey::from("a")), Some(1));
        assert!(Store::delete(&mut lru, &CacheKey::from("a")));
        assert!(!Store::delete(&mut lru, &CacheKey::from("a")));
    }
}
