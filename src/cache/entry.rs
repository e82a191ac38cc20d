//! Cache Entry Module
//!
//! Defines a single cached value with its size estimate and timestamps.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// A cached value plus the bookkeeping needed for TTL and LRU decisions.
///
/// Timestamps come from `tokio::time::Instant`, so a paused test runtime
/// controls expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Estimated resident size in bytes, key and overhead included
    pub size_estimate: usize,
    pub created_at: Instant,
    pub last_accessed: Instant,
    /// Always later than `created_at`
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry that lives for `ttl` from now.
    ///
    /// Callers reject a zero `ttl` before getting here.
    pub fn new(value: V, size_estimate: usize, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            size_estimate,
            created_at: now,
            last_accessed: now,
            expires_at: now + ttl,
        }
    }

    // == Is Expired ==
    /// An entry is expired from the instant its TTL has fully elapsed.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_creation() {
        let entry = CacheEntry::new("test_value".to_string(), 42, Duration::from_secs(60));

        assert_eq!(entry.value, "test_value");
        assert_eq!(entry.size_estimate, 42);
        assert!(entry.expires_at > entry.created_at);
        assert_eq!(entry.created_at, entry.last_accessed);
        assert!(!entry.is_expired_at(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expiration() {
        let entry = CacheEntry::new("v", 1, Duration::from_secs(1));
        assert!(!entry.is_expired_at(Instant::now()));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!entry.is_expired_at(Instant::now()));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(entry.is_expired_at(Instant::now()), "Entry should be expired at boundary");
    }
}
