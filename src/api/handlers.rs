//! API Handlers
//!
//! HTTP request handlers for the resource API over stored images, storage
//! maintenance and the result cache.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::cache::{CacheManager, CacheManagerStats};
use crate::config::Config;
use crate::error::{ApiError, ApiResult, CacheResult, StorageError};
use crate::models::{
    CleanupResponse, DeleteResponse, HealthResponse, MessageResponse, RecentImagesResponse,
    RecentQuery,
};
use crate::storage::{Metadata, StorageManager, StorageStats};
use crate::tasks::run_cleanup_cycle;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<StorageManager>,
    pub cache: Arc<CacheManager>,
}

impl AppState {
    pub fn new(storage: StorageManager, cache: CacheManager) -> Self {
        Self {
            storage: Arc::new(storage),
            cache: Arc::new(cache),
        }
    }

    /// Builds the storage manager and result cache from configuration.
    ///
    /// Fails only when the configured cache backend cannot be constructed.
    pub fn from_config(config: &Config) -> CacheResult<Self> {
        let storage = StorageManager::new(config.storage.clone());
        let cache = CacheManager::from_config(&config.cache)?;
        Ok(Self::new(storage, cache))
    }
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /images
///
/// Most recent images first, limited by `limit` and a `days` window.
pub async fn list_images_handler(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<Json<RecentImagesResponse>> {
    if let Some(error_msg) = query.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let (limit, days) = (query.limit(), query.days());
    let images = state.storage.list_recent(limit, days).await;
    Ok(Json(RecentImagesResponse::new(images, limit, days)))
}

/// Handler for GET /images/:id
///
/// Returns the raw image bytes with a matching content type.
pub async fn get_image_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let path = state
        .storage
        .find(&id)
        .await
        .ok_or_else(|| StorageError::NotFound(id.clone()))?;
    let content_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(content_type_for)
        .unwrap_or("application/octet-stream");

    let (bytes, _) = state.storage.load(&id).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// Handler for GET /images/:id/metadata
pub async fn get_metadata_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Metadata>> {
    let metadata = state.storage.metadata(&id).await?;
    Ok(Json(metadata))
}

/// Handler for DELETE /images/:id
pub async fn delete_image_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    state.storage.delete(&id).await?;
    Ok(Json(DeleteResponse::new(id)))
}

/// Handler for GET /storage/stats
pub async fn storage_stats_handler(State(state): State<AppState>) -> Json<StorageStats> {
    Json(state.storage.stats().await)
}

/// Handler for POST /storage/cleanup
///
/// Runs one retention cycle immediately.
pub async fn cleanup_handler(State(state): State<AppState>) -> Json<CleanupResponse> {
    let report = run_cleanup_cycle(&state.storage, &state.cache).await;
    info!(
        removed = report.storage.removed,
        cache_expired = report.cache_expired,
        "Manual cleanup finished"
    );
    Json(CleanupResponse {
        removed: report.storage.removed,
        freed_bytes: report.storage.freed_bytes,
        failed: report.storage.failed,
        cache_expired: report.cache_expired,
    })
}

/// Handler for GET /cache/stats
pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheManagerStats> {
    Json(state.cache.stats().await)
}

/// Handler for DELETE /cache
pub async fn clear_cache_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.cache.clear().await;
    Json(MessageResponse::new("Cache cleared"))
}

fn content_type_for(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
