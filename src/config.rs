//! Configuration Module
//!
//! Loads storage, cache and server settings from environment variables.
//! Values are read once at startup and never mutated afterwards.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::ConfigError;

const BYTES_PER_MB: u64 = 1024 * 1024;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const SECS_PER_HOUR: u64 = 3600;

/// Upper bound for retention, in days
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Upper bound for the cleanup interval and the cache TTL, in hours
pub const MAX_HOURS: u64 = 24 * MAX_RETENTION_DAYS as u64;

// == Storage Config ==
/// Retention policy and location of the artifact store.
#[derive(Debug, Clone, Serialize)]
pub struct StorageConfig {
    /// Root directory; images live under `<base_path>/images`
    pub base_path: PathBuf,
    /// Artifacts older than this many days are deleted by age cleanup
    pub retention_days: u32,
    /// Upper bound on the total size of the image tree
    pub max_size_gb: f64,
    /// Interval between background cleanup runs
    pub cleanup_interval_hours: u64,
}

impl StorageConfig {
    /// Size bound in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_gb * BYTES_PER_GB) as u64
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_hours.saturating_mul(SECS_PER_HOUR))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./storage"),
            retention_days: 30,
            max_size_gb: 10.0,
            cleanup_interval_hours: 24,
        }
    }
}

// == Cache Config ==
/// Selectable cache backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Memory,
    Redis,
}

impl CacheBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackendKind::Memory => "memory",
            CacheBackendKind::Redis => "redis",
        }
    }
}

impl FromStr for CacheBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackendKind::Memory),
            "redis" => Ok(CacheBackendKind::Redis),
            other => Err(ConfigError::Invalid(format!(
                "unknown cache backend '{}'",
                other
            ))),
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize)]
pub struct CacheConfig {
    /// When false every cache operation is a no-op
    pub enabled: bool,
    pub backend: CacheBackendKind,
    /// Default time-to-live for cached results
    pub ttl_hours: u64,
    /// Capacity of the memory backend
    pub max_size_mb: u64,
    /// Connection string for the redis backend
    pub redis_url: Option<String>,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(SECS_PER_HOUR))
    }

    pub fn max_size_bytes(&self) -> usize {
        usize::try_from(self.max_size_mb.saturating_mul(BYTES_PER_MB)).unwrap_or(usize::MAX)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackendKind::Memory,
            ttl_hours: 24,
            max_size_mb: 500,
            redis_url: None,
        }
    }
}

// == Server Config ==
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

// == Config ==
/// Top-level configuration owned by the composition root.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Nested settings use a `__` delimiter, e.g. `STORAGE__RETENTION_DAYS`.
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let storage = StorageConfig {
            base_path: env::var("STORAGE__BASE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.storage.base_path),
            retention_days: env_or("STORAGE__RETENTION_DAYS", defaults.storage.retention_days),
            max_size_gb: env_or("STORAGE__MAX_SIZE_GB", defaults.storage.max_size_gb),
            cleanup_interval_hours: env_or(
                "STORAGE__CLEANUP_INTERVAL_HOURS",
                defaults.storage.cleanup_interval_hours,
            ),
        };

        let cache = CacheConfig {
            enabled: env_or("CACHE__ENABLED", defaults.cache.enabled),
            backend: env_or("CACHE__BACKEND", defaults.cache.backend),
            ttl_hours: env_or("CACHE__TTL_HOURS", defaults.cache.ttl_hours),
            max_size_mb: env_or("CACHE__MAX_SIZE_MB", defaults.cache.max_size_mb),
            redis_url: env::var("CACHE__REDIS_URL").ok(),
        };

        let server = ServerConfig {
            host: env::var("SERVER__HOST").unwrap_or(defaults.server.host),
            port: env_or("SERVER__PORT", defaults.server.port),
        };

        Self {
            storage,
            cache,
            server,
        }
    }

    /// Rejects settings no component can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_RETENTION_DAYS).contains(&self.storage.retention_days) {
            return Err(ConfigError::Invalid(format!(
                "storage.retention_days must be between 1 and {}",
                MAX_RETENTION_DAYS
            )));
        }
        if !(self.storage.max_size_gb > 0.0) {
            return Err(ConfigError::Invalid(
                "storage.max_size_gb must be positive".to_string(),
            ));
        }
        if !(1..=MAX_HOURS).contains(&self.storage.cleanup_interval_hours) {
            return Err(ConfigError::Invalid(format!(
                "storage.cleanup_interval_hours must be between 1 and {}",
                MAX_HOURS
            )));
        }
        if !(1..=MAX_HOURS).contains(&self.cache.ttl_hours) {
            return Err(ConfigError::Invalid(format!(
                "cache.ttl_hours must be between 1 and {}",
                MAX_HOURS
            )));
        }
        if self.cache.max_size_mb == 0 {
            return Err(ConfigError::Invalid(
                "cache.max_size_mb must be at least 1".to_string(),
            ));
        }
        if self.cache.backend == CacheBackendKind::Redis && self.cache.redis_url.is_none() {
            return Err(ConfigError::Invalid(
                "cache.redis_url is required when using the redis backend".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
