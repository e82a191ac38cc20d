//! Cache Module
//!
//! Result cache for image requests: key derivation, a size-bounded memory
//! store with TTL expiry and LRU eviction, and the manager that fronts it.

mod entry;
pub mod key;
mod lru;
mod manager;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use key::{content_hash, CacheKey, CacheParams};
pub use lru::LruTracker;
pub use manager::{CacheBackend, CacheManager, CacheManagerStats, MemoryBackend};
pub use stats::CacheStats;
pub use store::MemoryCache;

// == Public Constants ==
/// Fixed per-entry bookkeeping charge added to every size estimate
pub const ENTRY_OVERHEAD: usize = 100;
