//! API Routes
//!
//! Configures the Axum router with all resource endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cache_stats_handler, cleanup_handler, clear_cache_handler, delete_image_handler,
    get_image_handler, get_metadata_handler, health_handler, list_images_handler,
    storage_stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check
/// - `GET /images?limit&days` - Recent image metadata, newest first
/// - `GET /images/:id` - Raw image bytes
/// - `GET /images/:id/metadata` - Sidecar document
/// - `DELETE /images/:id` - Remove an image and its sidecar
/// - `GET /storage/stats` - Storage usage
/// - `POST /storage/cleanup` - Run one retention cycle now
/// - `GET /cache/stats` - Result cache statistics
/// - `DELETE /cache` - Drop every cached result
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/images", get(list_images_handler))
        .route(
            "/images/:id",
            get(get_image_handler).delete(delete_image_handler),
        )
        .route("/images/:id/metadata", get(get_metadata_handler))
        .route("/storage/stats", get(storage_stats_handler))
        .route("/storage/cleanup", post(cleanup_handler))
        .route("/cache/stats", get(cache_stats_handler))
        .route("/cache", axum::routing::delete(clear_cache_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheManager;
    use crate::config::StorageConfig;
    use crate::storage::StorageManager;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    fn create_test_app(dir: &TempDir) -> Router {
        let storage = StorageManager::new(StorageConfig {
            base_path: dir.path().to_path_buf(),
            ..StorageConfig::default()
        });
        create_router(AppState::new(storage, CacheManager::disabled()))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = TempDir::new().unwrap();
        let response = create_test_app(&dir)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_image_not_found() {
        let dir = TempDir::new().unwrap();
        let response = create_test_app(&dir)
            .oneshot(
                Request::builder()
                    .uri("/images/img_20240101120000_000000000000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_rejects_large_limit() {
        let dir = TempDir::new().unwrap();
        let response = create_test_app(&dir)
            .oneshot(
                Request::builder()
                    .uri("/images?limit=500")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_clear_cache_when_disabled() {
        let dir = TempDir::new().unwrap();
        let response = create_test_app(&dir)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/cache")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
