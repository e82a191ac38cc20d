//! Response DTOs
//!
//! Bodies returned by the image service and the resource API.

use serde::{Deserialize, Serialize};

use crate::storage::Metadata;

// == Image Result ==
/// Outcome of a generate or edit call.
///
/// `image_url` carries the payload as a data URL on a fresh result. The
/// cached copy swaps it for the resource URI so the cache never holds
/// image bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    pub task_id: String,
    pub image_id: String,
    pub image_url: String,
    pub resource_uri: String,
    pub metadata: ResultMetadata,
    /// Set when the result came from the cache
    #[serde(default)]
    pub cached: bool,
}

impl ImageResult {
    /// The form stored in the result cache.
    pub fn for_cache(&self) -> Self {
        Self {
            image_url: self.resource_uri.clone(),
            cached: false,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub operation: String,
    pub prompt: String,
    pub size: String,
    pub quality: String,
    pub output_format: String,
    pub background: String,
    pub created_at: String,
    pub file_size_bytes: u64,
    pub dimensions: String,
    pub format: String,
    pub local_path: String,
    pub url_path: String,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for GET /images
#[derive(Debug, Clone, Serialize)]
pub struct RecentImagesResponse {
    pub images: Vec<Metadata>,
    pub count: usize,
    pub limit: usize,
    pub days: u32,
}

impl RecentImagesResponse {
    pub fn new(images: Vec<Metadata>, limit: usize, days: u32) -> Self {
        Self {
            count: images.len(),
            images,
            limit,
            days,
        }
    }
}

/// Response body for DELETE /images/:id
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub image_id: String,
}

impl DeleteResponse {
    pub fn new(image_id: impl Into<String>) -> Self {
        let image_id = image_id.into();
        Self {
            message: format!("Image '{}' deleted successfully", image_id),
            image_id,
        }
    }
}

/// Response body for POST /storage/cleanup
#[derive(Debug, Clone, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
    pub freed_bytes: u64,
    pub failed: usize,
    pub cache_expired: usize,
}

/// Generic acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
