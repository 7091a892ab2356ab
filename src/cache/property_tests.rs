//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the LRU store and key resolution against a simple
//! reference model.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::cache::{LruCache, Store};
use crate::key::CacheKey;

// == Strategies ==
/// Generates short keys so that sequences revisit the same key often
fn key_strategy() -> impl Strategy<Value = CacheKey> {
    "[a-f]{1,2}".prop_map(CacheKey::from)
}

/// Generates a sequence of store operations for testing
#[derive(Debug, Clone)]
enum StoreOp {
    Set { key: CacheKey, value: u32 },
    Get { key: CacheKey },
    Delete { key: CacheKey },
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        (key_strategy(), any::<u32>()).prop_map(|(key, value)| StoreOp::Set { key, value }),
        key_strategy().prop_map(|key| StoreOp::Get { key }),
        key_strategy().prop_map(|key| StoreOp::Delete { key }),
    ]
}

/// Distinct keys, in generation order
fn unique_keys(min: usize, max: usize) -> impl Strategy<Value = Vec<CacheKey>> {
    prop::collection::vec("[a-z]{1,8}", min..max).prop_map(|keys| {
        let mut seen = HashSet::new();
        keys.into_iter()
            .filter(|k| seen.insert(k.clone()))
            .map(CacheKey::from)
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any sequence of operations, the store never holds more than its
    // capacity, and every stored key is tracked exactly once for recency.
    #[test]
    fn prop_capacity_and_queue_consistency(
        capacity in 1usize..8,
        ops in prop::collection::vec(store_op_strategy(), 1..100)
    ) {
        let mut lru: LruCache<CacheKey, u32> = LruCache::new(capacity);

        for op in ops {
            match op {
                StoreOp::Set { key, value } => Store::set(&mut lru, key, value),
                StoreOp::Get { key } => { let _ = Store::get(&mut lru, &key); }
                StoreOp::Delete { key } => { let _ = Store::delete(&mut lru, &key); }
            }

            prop_assert!(lru.len() <= capacity, "Size {} exceeds capacity {}", lru.len(), capacity);
            prop_assert_eq!(lru.queue_len(), lru.len(), "Queue and storage diverged");
        }
    }

    // Without a capacity, the store behaves like a plain map.
    #[test]
    fn prop_unbounded_matches_map(ops in prop::collection::vec(store_op_strategy(), 1..100)) {
        let mut lru: LruCache<CacheKey, u32> = LruCache::new(usize::MAX);
        let mut model: HashMap<CacheKey, u32> = HashMap::new();

        for op in ops {
            match op {
                StoreOp::Set { key, value } => {
                    Store::set(&mut lru, key.clone(), value);
                    model.insert(key, value);
                }
                StoreOp::Get { key } => {
                    prop_assert_eq!(Store::get(&mut lru, &key), model.get(&key).copied());
                }
                StoreOp::Delete { key } => {
                    prop_assert_eq!(Store::delete(&mut lru, &key), model.remove(&key).is_some());
                }
            }
        }

        prop_assert_eq!(lru.len(), model.len());
        prop_assert_eq!(lru.evictions(), 0);
    }

    // Filling the store and adding one more key evicts the first key inserted.
    #[test]
    fn prop_lru_eviction_order(keys in unique_keys(3, 10), extra in "[0-9]{1,4}") {
        prop_assume!(keys.len() >= 2);
        let extra = CacheKey::from(extra);

        let mut lru = LruCache::new(keys.len());
        for (i, key) in keys.iter().enumerate() {
            lru.insert(key.clone(), i);
        }
        prop_assert_eq!(lru.peek_oldest(), Some(&keys[0]));

        lru.insert(extra.clone(), usize::MAX);

        prop_assert_eq!(lru.len(), keys.len());
        prop_assert!(!lru.contains(&keys[0]), "Oldest key should have been evicted");
        prop_assert!(lru.contains(&extra));
        for key in keys.iter().skip(1) {
            prop_assert!(lru.contains(key), "Key {} should still be cached", key);
        }
        prop_assert_eq!(lru.evictions(), 1);
    }

    // A read promotes the key so that the next oldest key is evicted instead.
    #[test]
    fn prop_lru_access_tracking(keys in unique_keys(3, 8), extra in "[0-9]{1,4}") {
        prop_assume!(keys.len() >= 3);
        let extra = CacheKey::from(extra);

        let mut lru = LruCache::new(keys.len());
        for (i, key) in keys.iter().enumerate() {
            lru.insert(key.clone(), i);
        }

        prop_assert_eq!(lru.get(&keys[0]), Some(&0));
        lru.insert(extra, usize::MAX);

        prop_assert!(lru.contains(&keys[0]), "Accessed key should survive eviction");
        prop_assert!(!lru.contains(&keys[1]), "Next oldest key should be evicted");
    }

    // A deleted key no longer takes part in eviction.
    #[test]
    fn prop_delete_leaves_eviction_order(keys in unique_keys(3, 8), extra in "[0-9]{1,4}") {
        prop_assume!(keys.len() >= 3);
        let extra = CacheKey::from(extra);

        let mut lru = LruCache::new(keys.len());
        for (i, key) in keys.iter().enumerate() {
            lru.insert(key.clone(), i);
        }

        prop_assert!(Store::delete(&mut lru, &keys[0]));
        lru.insert(extra.clone(), usize::MAX);

        prop_assert_eq!(lru.len(), keys.len());
        prop_assert_eq!(lru.evictions(), 0);
        prop_assert_eq!(lru.peek_oldest(), Some(&keys[1]));
    }

    // Resolving the same map contents always yields the same key,
    // whatever the insertion order.
    #[test]
    fn prop_key_independent_of_field_order(
        fields in prop::collection::vec(("[a-z]{1,6}", any::<i64>()), 1..10)
    ) {
        let forward: BTreeMap<String, i64> = fields.iter().cloned().collect();
        let mut backward: HashMap<String, i64> = HashMap::new();
        for (name, value) in fields.iter().rev() {
            backward.entry(name.clone()).or_insert(*value);
        }
        // last write wins in `forward`, first write from the back in `backward`
        let backward_as_forward: BTreeMap<String, i64> = backward.into_iter().collect();
        prop_assert_eq!(&forward, &backward_as_forward);

        let a = CacheKey::resolve(&forward).unwrap();
        let b = CacheKey::resolve(&backward_as_forward.iter().collect::<HashMap<_, _>>()).unwrap();
        prop_assert_eq!(a, b);
    }
}
