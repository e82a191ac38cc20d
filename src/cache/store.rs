//! Cache Store Module
//!
//! Size-bounded memory cache with TTL expiry and LRU eviction.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, LruTracker, ENTRY_OVERHEAD};
use crate::error::{CacheError, CacheResult};

// == Memory Cache ==
/// In-memory store bounded by the total estimated size of its entries.
///
/// `current_size` always equals the sum of the live entries'
/// `size_estimate`, and never exceeds `max_size_bytes`.
///
/// All operations take `&mut self`; share it behind a lock.
#[derive(Debug)]
pub struct MemoryCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    lru: LruTracker,
    stats: CacheStats,
    max_size_bytes: usize,
    current_size: usize,
    default_ttl: Duration,
}

impl<V: Clone + Serialize> MemoryCache<V> {
    // == Constructor ==
    /// Creates a cache holding at most `max_size_bytes` of estimated data.
    pub fn new(max_size_bytes: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(max_size_bytes),
            max_size_bytes,
            current_size: 0,
            default_ttl,
        }
    }

    // == Size Estimate ==
    /// Serialized JSON length plus key length plus a fixed overhead.
    pub fn estimate_size(key: &str, value: &V) -> CacheResult<usize> {
        let serialized = serde_json::to_vec(value)?;
        Ok(serialized.len() + key.len() + ENTRY_OVERHEAD)
    }

    // == Get ==
    /// Returns the value if present and unexpired.
    ///
    /// An expired entry is dropped on the spot.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.remove_entry(key);
            self.stats.record_expiration();
            self.stats.record_miss();
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.last_accessed = now;
        self.lru.touch(key);
        self.stats.record_hit();
        Some(entry.value.clone())
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl` (default TTL when `None`).
    ///
    /// Room is made by purging expired entries first, then evicting the
    /// least recently used ones. A value larger than the whole cache is
    /// refused.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Option<Duration>) -> CacheResult<()> {
        let key = key.into();
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl);
        }

        let size = Self::estimate_size(&key, &value)?;
        if size > self.max_size_bytes {
            return Err(CacheError::Oversize {
                size,
                capacity: self.max_size_bytes,
            });
        }

        // Overwrite releases the old entry's space before making room
        self.remove_entry(&key);

        if self.current_size + size > self.max_size_bytes {
            self.purge_expired();
        }

        while self.current_size + size > self.max_size_bytes {
            let Some(victim) = self.lru.evict_oldest() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&victim) {
                self.current_size -= entry.size_estimate;
                self.stats.record_eviction();
                debug!(key = %victim, size = entry.size_estimate, "Evicted least recently used entry");
            }
        }

        self.entries
            .insert(key.clone(), CacheEntry::new(value, size, ttl));
        self.lru.touch(&key);
        self.current_size += size;
        Ok(())
    }

    // == Delete ==
    /// Removes `key`; returns whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key)
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.current_size = 0;
    }

    // == Purge Expired ==
    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
            self.stats.record_expiration();
        }
        expired.len()
    }

    // == Stats ==
    /// Purges expired entries, then reports counters and occupancy.
    pub fn stats(&mut self) -> CacheStats {
        self.purge_expired();
        let mut stats = self.stats.clone();
        stats.set_occupancy(self.entries.len(), self.current_size);
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of live entries' size estimates.
    pub fn size_bytes(&self) -> usize {
        self.current_size
    }

    pub fn capacity(&self) -> usize {
        self.max_size_bytes
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.current_size -= entry.size_estimate;
                self.lru.remove(key);
                true
            }
            None => false,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    fn size_of(key: &str, value: &str) -> usize {
        MemoryCache::<String>::estimate_size(key, &value.to_string()).unwrap()
    }

    #[test]
    fn test_estimate_size() {
        // "\"abc\"" is 5 bytes
        assert_eq!(size_of("k", "abc"), 5 + 1 + ENTRY_OVERHEAD);
    }

    #[test]
    fn test_store_set_and_get() {
        let mut cache = MemoryCache::new(10_000, TTL);
        cache.set("key1", "value1".to_string(), None).unwrap();

        assert_eq!(cache.get("key1").as_deref(), Some("value1"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), size_of("key1", "value1"));
    }

    #[test]
    fn test_store_get_missing() {
        let mut cache: MemoryCache<String> = MemoryCache::new(10_000, TTL);
        assert!(cache.get("nonexistent").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_store_overwrite_keeps_accounting() {
        let mut cache = MemoryCache::new(10_000, TTL);
        cache.set("key1", "short".to_string(), None).unwrap();
        cache.set("key1", "a longer value".to_string(), None).unwrap();

        assert_eq!(cache.get("key1").as_deref(), Some("a longer value"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), size_of("key1", "a longer value"));
    }

    #[test]
    fn test_store_rejects_oversize() {
        let mut cache = MemoryCache::new(150, TTL);
        let big = "x".repeat(200);

        let result = cache.set("big", big, None);
        assert!(matches!(result, Err(CacheError::Oversize { .. })));
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_store_rejects_zero_ttl() {
        let mut cache = MemoryCache::new(10_000, TTL);
        let result = cache.set("k", "v".to_string(), Some(Duration::ZERO));
        assert!(matches!(result, Err(CacheError::InvalidTtl)));
    }

    #[test]
    fn test_store_delete_and_clear_accounting() {
        let mut cache = MemoryCache::new(10_000, TTL);
        cache.set("a", "1".to_string(), None).unwrap();
        cache.set("b", "2".to_string(), None).unwrap();

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.size_bytes(), size_of("b", "2"));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_store_evicts_least_recently_used() {
        let entry = size_of("k1", "v1");
        let mut cache = MemoryCache::new(entry * 3, TTL);
        cache.set("k1", "v1".to_string(), None).unwrap();
        cache.set("k2", "v2".to_string(), None).unwrap();
        cache.set("k3", "v3".to_string(), None).unwrap();

        // k1 becomes most recent, so k2 is the victim
        assert!(cache.get("k1").is_some());
        cache.set("k4", "v4".to_string(), None).unwrap();

        assert_eq!(cache.len(), 3);
        assert!(cache.get("k2").is_none());
        assert!(cache.get("k1").is_some());
        assert!(cache.get("k3").is_some());
        assert!(cache.get("k4").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_store_evicts_only_what_is_needed() {
        let small = size_of("s1", "v");
        let mut cache = MemoryCache::new(small * 4, TTL);
        for key in ["s1", "s2", "s3", "s4"] {
            cache.set(key, "v".to_string(), None).unwrap();
        }

        // Needs exactly two slots
        let wide = "v".repeat(small + 1);
        cache.set("w", wide, None).unwrap();

        assert!(cache.get("s1").is_none());
        assert!(cache.get("s2").is_none());
        assert!(cache.get("s3").is_some());
        assert!(cache.get("s4").is_some());
        assert!(cache.size_bytes() <= cache.capacity());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_expiration() {
        let mut cache = MemoryCache::new(10_000, TTL);
        cache
            .set("key1", "value1".to_string(), Some(Duration::from_secs(1)))
            .unwrap();
        assert!(cache.get("key1").is_some());
        let before = cache.size_bytes();

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert!(cache.get("key1").is_none());
        assert!(cache.size_bytes() < before);
        assert_eq!(cache.size_bytes(), 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_purges_expired_before_evicting() {
        let entry = size_of("k1", "v1");
        let mut cache = MemoryCache::new(entry * 2, TTL);
        cache
            .set("k1", "v1".to_string(), Some(Duration::from_secs(1)))
            .unwrap();
        cache.set("k2", "v2".to_string(), None).unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        cache.set("k3", "v3".to_string(), None).unwrap();

        // The expired k1 made room; the live k2 survives
        assert!(cache.get("k2").is_some());
        assert!(cache.get("k3").is_some());
        let stats = cache.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_stats_purges_first() {
        let mut cache = MemoryCache::new(10_000, TTL);
        cache
            .set("short", "v".to_string(), Some(Duration::from_secs(1)))
            .unwrap();
        cache.set("long", "v".to_string(), None).unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.size_bytes, size_of("long", "v"));
        assert!(stats.utilization > 0.0 && stats.utilization < 1.0);
    }
}
