//! Cache Statistics Module
//!
//! Counters and occupancy figures for the memory cache.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    /// Lookups that found nothing or an expired entry
    pub misses: u64,
    /// Entries dropped to make room for new ones
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed
    pub expirations: u64,
    /// Live entries
    pub entries: usize,
    /// Sum of live entries' size estimates
    pub size_bytes: usize,
    pub max_size_bytes: usize,
    /// `size_bytes / max_size_bytes`
    pub utilization: f64,
    /// `hits / (hits + misses)`, 0.0 before any lookup
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            max_size_bytes,
            ..Self::default()
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    // == Occupancy ==
    /// Fills in the derived figures for a snapshot.
    pub fn set_occupancy(&mut self, entries: usize, size_bytes: usize) {
        let lookups = self.hits + self.misses;
        self.hit_rate = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        };
        self.entries = entries;
        self.size_bytes = size_bytes;
        self.utilization = if self.max_size_bytes == 0 {
            0.0
        } else {
            size_bytes as f64 / self.max_size_bytes as f64
        };
    }
}
