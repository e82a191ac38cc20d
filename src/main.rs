//! Image Store - resource server over the local image store
//!
//! Composition root: builds the storage manager and result cache from the
//! environment, starts the retention task and serves the resource API.
//!
//! No image provider is wired into this binary, so nothing here fills the
//! result cache: `/cache/stats` and `DELETE /cache` see an empty cache.
//! Embedders that generate images build an `ImageService` over the same
//! `AppState` storage and cache.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_store::api::{create_router, AppState};
use image_store::config::Config;
use image_store::tasks::spawn_cleanup_task;

const DEFAULT_LOG_FILTER: &str = "image_store=info,tower_http=info";

/// Main entry point for the image store server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Build storage manager and result cache
/// 4. Create the storage directory skeleton
/// 5. Start background retention task
/// 6. Serve the resource API until SIGINT/SIGTERM
/// 7. Stop the retention task and wait for it
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().ok();
    let filter_fallback = filter.is_none();
    tracing_subscriber::registry()
        .with(filter.unwrap_or_else(|| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    if filter_fallback {
        warn!(filter = DEFAULT_LOG_FILTER, "RUST_LOG unset or invalid, using default log filter");
    }

    info!("Starting Image Store");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        base_path = %config.storage.base_path.display(),
        retention_days = config.storage.retention_days,
        max_size_gb = config.storage.max_size_gb,
        cache_enabled = config.cache.enabled,
        cache_backend = config.cache.backend.as_str(),
        "Configuration loaded"
    );

    let state = AppState::from_config(&config).context("failed to build result cache")?;
    state.storage.initialize().await;
    info!("Storage initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup_handle = spawn_cleanup_task(
        state.storage.clone(),
        state.cache.clone(),
        config.storage.cleanup_interval(),
        shutdown_rx,
    );
    info!("Background retention task started");

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if shutdown_tx.send(true).is_err() {
        warn!("Retention task already stopped");
    }
    if let Err(e) = cleanup_handle.await {
        warn!(error = %e, "Retention task ended abnormally");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
