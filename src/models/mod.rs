//! Request and response models
//!
//! Parameter enums, the DTOs handed to the image service, and the bodies
//! of the resource API.

pub mod params;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use params::{
    BackgroundType, ImageQuality, ImageSize, ImageStyle, ModerationLevel, OutputFormat,
    RequestParam,
};
pub use requests::{EditRequest, GenerationRequest, RecentQuery};
pub use responses::{
    CleanupResponse, DeleteResponse, HealthResponse, ImageResult, MessageResponse,
    RecentImagesResponse, ResultMetadata,
};
