//! Storage statistics and cleanup reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Storage Stats ==
/// Snapshot of the image tree produced by a full scan.
#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    /// Number of stored binaries
    pub total_images: usize,
    /// Binaries plus sidecars, in MB rounded to two decimals
    pub total_size_mb: f64,
    pub oldest_image: Option<DateTime<Utc>>,
    pub newest_image: Option<DateTime<Utc>>,
    pub retention_days: u32,
    pub max_size_gb: f64,
    pub base_path: String,
}

pub(crate) fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

// == Cleanup Report ==
/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Artifacts fully deleted
    pub removed: usize,
    /// Bytes released by those deletions
    pub freed_bytes: u64,
    /// Artifacts that could not be deleted this pass
    pub failed: usize,
}

impl CleanupReport {
    pub fn merge(self, other: CleanupReport) -> CleanupReport {
        CleanupReport {
            removed: self.removed + other.removed,
            freed_bytes: self.freed_bytes + other.freed_bytes,
            failed: self.failed + other.failed,
        }
    }
}
