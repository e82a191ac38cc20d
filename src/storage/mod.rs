//! Storage Module
//!
//! Durable, date-partitioned persistence of generated images with JSON
//! sidecars and age/size retention.

pub mod id;
mod manager;
pub mod metadata;
mod stats;

pub use id::ArtifactId;
pub use manager::StorageManager;
pub use metadata::{FileInfo, Metadata};
pub use stats::{CleanupReport, StorageStats};
