//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the memory cache's accounting and ordering rules
//! and the key builder's determinism over arbitrary inputs.

use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

use crate::cache::{CacheKey, CacheParams, MemoryCache, ENTRY_OVERHEAD};

// == Test Configuration ==
const TEST_CAPACITY: usize = 4096;
const TEST_DEFAULT_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
/// Generates cache keys shaped like real ones
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f0-9]{1,32}".prop_map(|s| s)
}

/// Generates small cache values
fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,256}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Purge,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        3 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        2 => key_strategy().prop_map(|key| CacheOp::Delete { key }),
        1 => Just(CacheOp::Purge),
    ]
}

fn size_of(key: &str, value: &str) -> usize {
    MemoryCache::<String>::estimate_size(key, &value.to_string()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Storing a pair and reading it back before expiry returns the same value.
    #[test]
    fn prop_roundtrip_storage(key in key_strategy(), value in value_strategy()) {
        let mut cache = MemoryCache::new(TEST_CAPACITY, TEST_DEFAULT_TTL);
        cache.set(key.clone(), value.clone(), None).unwrap();

        prop_assert_eq!(cache.get(&key), Some(value));
    }

    // Occupancy always equals the sum of live entries and never exceeds capacity.
    #[test]
    fn prop_size_accounting(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let capacity = 1024;
        let mut cache = MemoryCache::new(capacity, TEST_DEFAULT_TTL);
        let mut model: std::collections::HashMap<String, usize> = Default::default();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    let size = size_of(&key, &value);
                    if cache.set(key.clone(), value, None).is_ok() {
                        model.insert(key, size);
                    } else {
                        prop_assert!(size > capacity, "Only oversize values may be refused");
                    }
                }
                CacheOp::Get { key } => {
                    let _ = cache.get(&key);
                }
                CacheOp::Delete { key } => {
                    let _ = cache.delete(&key);
                }
                CacheOp::Purge => {
                    prop_assert_eq!(cache.purge_expired(), 0);
                }
            }

            // Evictions may have dropped model entries; keep only live ones
            model.retain(|key, _| cache.get(key).is_some());
            let expected: usize = model.values().sum();
            prop_assert_eq!(cache.size_bytes(), expected);
            prop_assert!(cache.size_bytes() <= capacity);
            prop_assert_eq!(cache.len(), model.len());
        }
    }

    // Overwriting a key keeps one entry and charges only the new value.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        first in value_strategy(),
        second in value_strategy()
    ) {
        let mut cache = MemoryCache::new(TEST_CAPACITY, TEST_DEFAULT_TTL);
        cache.set(key.clone(), first, None).unwrap();
        cache.set(key.clone(), second.clone(), None).unwrap();

        prop_assert_eq!(cache.len(), 1);
        prop_assert_eq!(cache.size_bytes(), size_of(&key, &second));
        prop_assert_eq!(cache.get(&key), Some(second));
    }

    // Deleting every key, or clearing, returns occupancy to zero.
    #[test]
    fn prop_delete_and_clear_release_space(
        pairs in prop::collection::vec((key_strategy(), value_strategy()), 1..20),
        clear in any::<bool>()
    ) {
        let mut cache = MemoryCache::new(TEST_CAPACITY * 4, TEST_DEFAULT_TTL);
        for (key, value) in &pairs {
            cache.set(key.clone(), value.clone(), None).unwrap();
        }

        if clear {
            cache.clear();
        } else {
            let keys: HashSet<&String> = pairs.iter().map(|(key, _)| key).collect();
            for key in keys {
                prop_assert!(cache.delete(key));
            }
        }

        prop_assert!(cache.is_empty());
        prop_assert_eq!(cache.size_bytes(), 0);
    }

    // With equal-sized entries, inserting into a full cache evicts the first
    // one inserted unless it was read in between.
    #[test]
    fn prop_lru_eviction_order(
        keys in prop::collection::hash_set("[a-f]{8}", 3..8),
        touch_first in any::<bool>()
    ) {
        let keys: Vec<String> = keys.into_iter().collect();
        let entry = size_of(&keys[0], "v");
        let mut cache = MemoryCache::new(entry * keys.len(), TEST_DEFAULT_TTL);
        for key in &keys {
            cache.set(key.clone(), "v".to_string(), None).unwrap();
        }

        if touch_first {
            prop_assert!(cache.get(&keys[0]).is_some());
        }
        cache.set("00000000", "v".to_string(), None).unwrap();

        let victim = if touch_first { &keys[1] } else { &keys[0] };
        prop_assert!(cache.get(victim).is_none());
        prop_assert!(cache.get("00000000").is_some());
        prop_assert_eq!(cache.stats().evictions, 1);
    }

    // Key derivation ignores parameter insertion order.
    #[test]
    fn prop_key_order_independence(
        fields in prop::collection::btree_map("[a-z_]{1,12}", "[a-zA-Z0-9 ]{0,24}", 0..10)
    ) {
        let forward: CacheParams = fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let backward: CacheParams = fields.iter().rev().map(|(k, v)| (k.clone(), v.clone())).collect();

        let key = CacheKey::build("image_gen", &forward);
        prop_assert_eq!(&key, &CacheKey::build("image_gen", &backward));
        prop_assert_eq!(key.as_str().len(), 32);
    }

    // An entry's size estimate is at least the fixed overhead plus its key.
    #[test]
    fn prop_size_estimate_floor(key in key_strategy(), value in value_strategy()) {
        prop_assert!(size_of(&key, &value) >= ENTRY_OVERHEAD + key.len() + value.len() + 2);
    }
}
