//! Retention Cleanup Task
//!
//! Background task that periodically enforces the storage retention policy
//! and drops expired cache entries.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::CacheManager;
use crate::storage::{CleanupReport, StorageManager};

/// What one cleanup cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub storage: CleanupReport,
    pub cache_expired: usize,
}

/// Runs age cleanup, size cleanup and the cache purge once.
pub async fn run_cleanup_cycle(storage: &StorageManager, cache: &CacheManager) -> CycleReport {
    let storage = storage.run_cleanup().await;
    let cache_expired = cache.purge_expired().await;
    CycleReport {
        storage,
        cache_expired,
    }
}

/// Spawns the retention loop.
///
/// The loop sleeps for `interval`, then runs one cycle, forever. Each cycle
/// runs in its own task, so a panic inside it is logged and the loop moves
/// on to the next tick.
///
/// Sending `true` on `shutdown` (or dropping the sender) stops the loop
/// while it waits. A cycle already in progress finishes first, so no
/// deletion is left half done.
///
/// # Example
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = spawn_cleanup_task(storage, cache, Duration::from_secs(3600), shutdown_rx);
/// // Later, during shutdown:
/// shutdown_tx.send(true).ok();
/// handle.await.ok();
/// ```
pub fn spawn_cleanup_task(
    storage: Arc<StorageManager>,
    cache: Arc<CacheManager>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    spawn_cycle_loop(interval, shutdown, move || {
        let storage = storage.clone();
        let cache = cache.clone();
        async move { run_cleanup_cycle(&storage, &cache).await }
    })
}

/// The loop behind [`spawn_cleanup_task`], driving any cycle future.
pub(crate) fn spawn_cycle_loop<F, Fut>(
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    cycle: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = CycleReport> + Send + 'static,
{
    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            "Starting retention cleanup task"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match tokio::spawn(cycle()).await {
                Ok(report) => {
                    if report.storage.removed > 0 || report.cache_expired > 0 {
                        info!(
                            removed = report.storage.removed,
                            freed_bytes = report.storage.freed_bytes,
                            failed = report.storage.failed,
                            cache_expired = report.cache_expired,
                            "Retention cleanup finished"
                        );
                    } else {
                        debug!("Retention cleanup: nothing to remove");
                    }
                }
                Err(e) => error!(error = %e, "Retention cleanup cycle failed"),
            }
        }

        info!("Retention cleanup task stopped");
    })
}
