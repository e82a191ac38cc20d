//! Image Store - date-partitioned image artifacts with a bounded result cache
//!
//! Persists generated images with JSON sidecars, enforces age and size
//! retention, and caches generation results with TTL expiry and LRU
//! eviction.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use cache::CacheManager;
pub use config::Config;
pub use service::{ImageProvider, ImageService};
pub use storage::StorageManager;
pub use tasks::spawn_cleanup_task;
