//! API Module
//!
//! HTTP handlers and routing for the image resource API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /images` - List recent images
//! - `GET /images/:id` - Fetch image bytes
//! - `GET /images/:id/metadata` - Fetch image metadata
//! - `DELETE /images/:id` - Delete an image
//! - `GET /storage/stats` - Storage statistics
//! - `POST /storage/cleanup` - Run retention cleanup now
//! - `GET /cache/stats` - Result cache statistics
//! - `DELETE /cache` - Clear the result cache

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
