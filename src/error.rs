//! Error types for the image store
//!
//! Each concern gets its own thiserror enum. Request-path failures propagate
//! to the caller; maintenance-path failures are logged where they happen.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Storage Error ==
/// Errors surfaced by request-path storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No binary exists for the id under any supported extension
    #[error("Image {0} not found")]
    NotFound(String),

    /// The requested file extension is not one the store can look up again
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Disk full, permission denied, and friends
    #[error("I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sidecar document could not be serialized
    #[error("Metadata serialization failed: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// == Cache Error ==
/// Errors reported by cache backends.
///
/// The cache manager folds all of these into a `false` return from its
/// `set_*` operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A single value is larger than the whole cache
    #[error("Entry of {size} bytes exceeds cache capacity of {capacity} bytes")]
    Oversize { size: usize, capacity: usize },

    /// A zero TTL would create an entry that is born expired
    #[error("TTL must be greater than zero")]
    InvalidTtl,

    /// The value could not be serialized for size estimation
    #[error("Value serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The configured backend has no implementation in this build
    #[error("Unsupported cache backend: {0}")]
    UnsupportedBackend(String),
}

// == Config Error ==
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// == Provider Error ==
/// Failure reported by an image provider, carried as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ProviderError(pub String);

// == Service Error ==
/// Errors from the generate/edit request flow.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The provider failed; its error is passed through uninterpreted
    #[error("Provider {provider} failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

// == API Error ==
/// HTTP-facing error for the resource API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StorageError::UnsupportedFormat(_) => ApiError::InvalidRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Aliases ==
pub type StorageResult<T> = std::result::Result<T, StorageError>;
pub type CacheResult<T> = std::result::Result<T, CacheError>;
pub type ApiResult<T> = std::result::Result<T, ApiError>;
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
