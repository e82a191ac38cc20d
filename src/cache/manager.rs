//! Cache Manager
//!
//! Typed get/set for generation and edit results over a pluggable backend.
//! A disabled manager answers every call deterministically: gets miss and
//! sets report `false`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::key::{CacheKey, CacheParams};
use crate::cache::{CacheStats, MemoryCache};
use crate::config::{CacheBackendKind, CacheConfig};
use crate::error::{CacheError, CacheResult};

pub const GENERATION_OPERATION: &str = "image_gen";
pub const EDIT_OPERATION: &str = "image_edit";

/// Parameter name under which an edit's source image hash is folded in
pub const SOURCE_IMAGE_FIELD: &str = "image_data";

// == Cache Backend ==
/// Storage behind the cache manager.
///
/// The memory backend ships with the crate; shared backends plug in here.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<Value>;

    async fn set(&self, key: &CacheKey, value: Value, ttl: Option<Duration>) -> CacheResult<()>;

    async fn delete(&self, key: &CacheKey) -> bool;

    async fn clear(&self);

    /// Drops expired entries, returning how many went.
    async fn purge_expired(&self) -> usize;

    async fn stats(&self) -> CacheStats;

    fn name(&self) -> &'static str;
}

// == Memory Backend ==
/// [`MemoryCache`] behind an async mutex.
#[derive(Debug)]
pub struct MemoryBackend {
    inner: Mutex<MemoryCache<Value>>,
}

impl MemoryBackend {
    pub fn new(max_size_bytes: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(MemoryCache::new(max_size_bytes, default_ttl)),
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &CacheKey) -> Option<Value> {
        self.inner.lock().await.get(key.as_str())
    }

    async fn set(&self, key: &CacheKey, value: Value, ttl: Option<Duration>) -> CacheResult<()> {
        self.inner.lock().await.set(key.as_str(), value, ttl)
    }

    async fn delete(&self, key: &CacheKey) -> bool {
        self.inner.lock().await.delete(key.as_str())
    }

    async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    async fn purge_expired(&self) -> usize {
        self.inner.lock().await.purge_expired()
    }

    async fn stats(&self) -> CacheStats {
        self.inner.lock().await.stats()
    }

    fn name(&self) -> &'static str {
        CacheBackendKind::Memory.as_str()
    }
}

// == Manager Stats ==
#[derive(Debug, Clone, Serialize)]
pub struct CacheManagerStats {
    pub enabled: bool,
    pub backend: Option<&'static str>,
    #[serde(flatten)]
    pub cache: Option<CacheStats>,
}

// == Cache Manager ==
#[derive(Clone)]
pub struct CacheManager {
    backend: Option<Arc<dyn CacheBackend>>,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl CacheManager {
    // == Constructors ==
    /// Builds the manager and backend described by `config`.
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        if !config.enabled {
            info!("Result cache disabled");
            return Ok(Self::disabled());
        }

        match config.backend {
            CacheBackendKind::Memory => {
                info!(
                    max_size_mb = config.max_size_mb,
                    ttl_hours = config.ttl_hours,
                    "Using memory result cache"
                );
                let backend = MemoryBackend::new(config.max_size_bytes(), config.ttl());
                Ok(Self::with_backend(Arc::new(backend)))
            }
            CacheBackendKind::Redis => Err(CacheError::UnsupportedBackend(
                CacheBackendKind::Redis.as_str().to_string(),
            )),
        }
    }

    pub fn with_backend(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    // == Generation ==
    pub async fn get_generation<T: DeserializeOwned>(&self, params: &CacheParams) -> Option<T> {
        self.get_typed(GENERATION_OPERATION, params).await
    }

    pub async fn set_generation<T: Serialize>(&self, params: &CacheParams, result: &T) -> bool {
        self.set_typed(GENERATION_OPERATION, params, result).await
    }

    // == Edit ==
    /// Edit lookups fold the source image's content hash into the key.
    pub async fn get_edit<T: DeserializeOwned>(
        &self,
        params: &CacheParams,
        source_image: &[u8],
    ) -> Option<T> {
        let params = params.clone().with_binary(SOURCE_IMAGE_FIELD, source_image);
        self.get_typed(EDIT_OPERATION, &params).await
    }

    pub async fn set_edit<T: Serialize>(
        &self,
        params: &CacheParams,
        source_image: &[u8],
        result: &T,
    ) -> bool {
        let params = params.clone().with_binary(SOURCE_IMAGE_FIELD, source_image);
        self.set_typed(EDIT_OPERATION, &params, result).await
    }

    // == Maintenance ==
    pub async fn clear(&self) {
        if let Some(backend) = &self.backend {
            backend.clear().await;
            info!("Result cache cleared");
        }
    }

    pub async fn purge_expired(&self) -> usize {
        match &self.backend {
            Some(backend) => backend.purge_expired().await,
            None => 0,
        }
    }

    pub async fn stats(&self) -> CacheManagerStats {
        match &self.backend {
            Some(backend) => CacheManagerStats {
                enabled: true,
                backend: Some(backend.name()),
                cache: Some(backend.stats().await),
            },
            None => CacheManagerStats {
                enabled: false,
                backend: None,
                cache: None,
            },
        }
    }

    async fn get_typed<T: DeserializeOwned>(
        &self,
        operation: &str,
        params: &CacheParams,
    ) -> Option<T> {
        let backend = self.backend.as_ref()?;
        let key = CacheKey::build(operation, params);
        let value = backend.get(&key).await?;

        match serde_json::from_value(value) {
            Ok(result) => {
                debug!(operation, key = %key, "Cache hit");
                Some(result)
            }
            Err(e) => {
                warn!(operation, key = %key, error = %e, "Cached value has unexpected shape, dropping it");
                backend.delete(&key).await;
                None
            }
        }
    }

    async fn set_typed<T: Serialize>(
        &self,
        operation: &str,
        params: &CacheParams,
        result: &T,
    ) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        let key = CacheKey::build(operation, params);

        let value = match serde_json::to_value(result) {
            Ok(value) => value,
            Err(e) => {
                warn!(operation, error = %e, "Result is not serializable, not caching");
                return false;
            }
        };

        match backend.set(&key, value, None).await {
            Ok(()) => {
                debug!(operation, key = %key, "Cached result");
                true
            }
            Err(e) => {
                warn!(operation, key = %key, error = %e, "Result not cached");
                false
            }
        }
    }
}
