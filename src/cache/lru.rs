//! LRU Tracker Module
//!
//! Orders keys by last access for least-recently-used eviction.

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
/// Recency index over cache keys.
///
/// Every touch stamps the key with a monotonically increasing sequence
/// number; the smallest stamp is the least recently used key. Touch, remove
/// and eviction are all `O(log n)`.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// sequence -> key, oldest first
    order: BTreeMap<u64, String>,
    /// key -> its current sequence
    stamps: HashMap<String, u64>,
    next: u64,
}

impl LruTracker {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as the most recently used, inserting it if new.
    pub fn touch(&mut self, key: &str) {
        let stamp = self.next;
        self.next += 1;
        if let Some(previous) = self.stamps.insert(key.to_string(), stamp) {
            self.order.remove(&previous);
        }
        self.order.insert(stamp, key.to_string());
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) {
        if let Some(stamp) = self.stamps.remove(key) {
            self.order.remove(&stamp);
        }
    }

    // == Evict Oldest ==
    /// Removes and returns the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.stamps.remove(&key);
        Some(key)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.stamps.clear();
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.stamps.contains_key(key)
    }
}
