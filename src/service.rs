//! Image Service
//!
//! The generate and edit request flows: cache lookup, provider call,
//! persistence, then a cache fill with the non-binary result.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::cache::CacheManager;
use crate::error::{ProviderError, ServiceError, ServiceResult};
use crate::models::{
    EditRequest, GenerationRequest, ImageResult, OutputFormat, RequestParam, ResultMetadata,
};
use crate::storage::metadata::{self, FileInfo, UNKNOWN};
use crate::storage::{Metadata, StorageManager};

// == Image Provider ==
/// Bytes and descriptive fields returned by a provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderImage {
    pub bytes: Vec<u8>,
    /// Provider-reported details, stored under `api_response` in the sidecar
    pub metadata: Metadata,
}

/// A hosted image model. Errors are reported once and never retried here.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Model identifier, part of every cache key
    fn model(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<ProviderImage, ProviderError>;

    async fn edit(&self, request: &EditRequest) -> Result<ProviderImage, ProviderError>;
}

// == Image Service ==
#[derive(Clone)]
pub struct ImageService {
    storage: Arc<StorageManager>,
    cache: Arc<CacheManager>,
    provider: Arc<dyn ImageProvider>,
}

impl ImageService {
    pub fn new(
        storage: Arc<StorageManager>,
        cache: Arc<CacheManager>,
        provider: Arc<dyn ImageProvider>,
    ) -> Self {
        Self {
            storage,
            cache,
            provider,
        }
    }

    /// Generates an image from a text prompt, or returns the cached result
    /// of an identical earlier request.
    pub async fn generate(&self, request: &GenerationRequest) -> ServiceResult<ImageResult> {
        if let Some(reason) = request.validate() {
            return Err(ServiceError::InvalidRequest(reason));
        }

        let params = request.cache_params(self.provider.model());
        if let Some(mut hit) = self.cache.get_generation::<ImageResult>(&params).await {
            info!(image_id = %hit.image_id, "Returning cached generation result");
            hit.cached = true;
            return Ok(hit);
        }

        let task_id = Uuid::new_v4().to_string();
        info!(task_id = %task_id, provider = self.provider.name(), "Generating image");

        let image = self
            .provider
            .generate(request)
            .await
            .map_err(|source| self.provider_error(&task_id, source))?;

        let parameters = json!({
            "model": self.provider.model(),
            "quality": request.quality,
            "size": request.size,
            "style": request.style,
            "moderation": request.moderation,
            "output_format": request.output_format,
            "compression": request.compression,
            "background": request.background,
        });

        let draft = Draft {
            task_id,
            operation: "generate",
            prompt: &request.prompt,
            size: request.size.as_str(),
            quality: request.quality.as_str(),
            background: request.background.as_str(),
            format: request.output_format,
            parameters,
            extra: Metadata::new(),
        };
        let result = self.persist(draft, image).await?;

        self.cache.set_generation(&params, &result.for_cache()).await;
        Ok(result)
    }

    /// Edits a caller-supplied image, or returns the cached result of an
    /// identical earlier edit of the same source.
    pub async fn edit(&self, request: &EditRequest) -> ServiceResult<ImageResult> {
        if let Some(reason) = request.validate() {
            return Err(ServiceError::InvalidRequest(reason));
        }

        let params = request.cache_params(self.provider.model());
        if let Some(mut hit) = self
            .cache
            .get_edit::<ImageResult>(&params, &request.source_image)
            .await
        {
            info!(image_id = %hit.image_id, "Returning cached edit result");
            hit.cached = true;
            return Ok(hit);
        }

        let task_id = Uuid::new_v4().to_string();
        info!(task_id = %task_id, provider = self.provider.name(), "Editing image");

        let image = self
            .provider
            .edit(request)
            .await
            .map_err(|source| self.provider_error(&task_id, source))?;

        let parameters = json!({
            "model": self.provider.model(),
            "quality": request.quality,
            "size": request.size,
            "output_format": request.output_format,
            "compression": request.compression,
            "background": request.background,
        });
        let mut extra = Metadata::new();
        extra.insert("has_mask".to_string(), Value::Bool(request.mask.is_some()));

        let draft = Draft {
            task_id,
            operation: "edit",
            prompt: &request.prompt,
            size: request.size.as_str(),
            quality: request.quality.as_str(),
            background: request.background.as_str(),
            format: request.output_format,
            parameters,
            extra,
        };
        let result = self.persist(draft, image).await?;

        self.cache
            .set_edit(&params, &request.source_image, &result.for_cache())
            .await;
        Ok(result)
    }

    fn provider_error(&self, task_id: &str, source: ProviderError) -> ServiceError {
        error!(task_id, provider = self.provider.name(), error = %source, "Provider call failed");
        ServiceError::Provider {
            provider: self.provider.name().to_string(),
            source,
        }
    }

    /// Saves the provider output and assembles the caller-facing result.
    async fn persist(&self, draft: Draft<'_>, image: ProviderImage) -> ServiceResult<ImageResult> {
        let mut sidecar = draft.extra;
        sidecar.insert("task_id".to_string(), Value::String(draft.task_id.clone()));
        sidecar.insert(
            "operation".to_string(),
            Value::String(draft.operation.to_string()),
        );
        sidecar.insert("prompt".to_string(), Value::String(draft.prompt.to_string()));
        sidecar.insert("parameters".to_string(), draft.parameters);
        sidecar.insert("api_response".to_string(), Value::Object(image.metadata));

        let ext = draft.format.as_str();
        let (id, path) = self.storage.save(&image.bytes, sidecar, ext).await?;
        let stored = self.storage.metadata(id.as_str()).await?;

        let file_info = stored
            .get("file_info")
            .and_then(|v| serde_json::from_value::<FileInfo>(v.clone()).ok());
        let dimensions = file_info
            .as_ref()
            .map(|info| info.dimensions.clone())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let result = ImageResult {
            task_id: draft.task_id,
            image_id: id.to_string(),
            image_url: data_url(draft.format, &image.bytes),
            resource_uri: id.resource_uri(),
            metadata: ResultMetadata {
                operation: draft.operation.to_string(),
                prompt: draft.prompt.to_string(),
                size: draft.size.to_string(),
                quality: draft.quality.to_string(),
                output_format: ext.to_string(),
                background: draft.background.to_string(),
                created_at: metadata::created_at(&stored).to_string(),
                file_size_bytes: image.bytes.len() as u64,
                dimensions,
                format: ext.to_ascii_uppercase(),
                local_path: path.display().to_string(),
                url_path: self.storage.url_path(id.as_str(), ext),
            },
            cached: false,
        };

        info!(
            task_id = %result.task_id,
            image_id = %result.image_id,
            operation = draft.operation,
            "Image stored"
        );
        Ok(result)
    }
}

/// Per-request fields shared by both flows.
struct Draft<'a> {
    task_id: String,
    operation: &'static str,
    prompt: &'a str,
    size: &'static str,
    quality: &'static str,
    background: &'static str,
    format: OutputFormat,
    parameters: Value,
    extra: Metadata,
}

fn data_url(format: OutputFormat, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        format.mime_type(),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, StorageConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn png_1x1() -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(1, 1));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[derive(Default)]
    struct FakeProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ImageProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        fn model(&self) -> &str {
            "fake-model-1"
        }

        async fn generate(&self, _: &GenerationRequest) -> Result<ProviderImage, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError("quota exceeded".to_string()));
            }
            let mut metadata = Metadata::new();
            metadata.insert("created".to_string(), json!(1_700_000_000));
            Ok(ProviderImage {
                bytes: png_1x1(),
                metadata,
            })
        }

        async fn edit(&self, _: &EditRequest) -> Result<ProviderImage, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderImage {
                bytes: png_1x1(),
                metadata: Metadata::new(),
            })
        }
    }

    fn service(dir: &TempDir, provider: Arc<FakeProvider>, cache_enabled: bool) -> ImageService {
        let storage = StorageManager::new(StorageConfig {
            base_path: dir.path().to_path_buf(),
            ..StorageConfig::default()
        });
        let cache = CacheManager::from_config(&CacheConfig {
            enabled: cache_enabled,
            ..CacheConfig::default()
        })
        .unwrap();
        ImageService::new(Arc::new(storage), Arc::new(cache), provider)
    }

    #[tokio::test]
    async fn test_generate_stores_and_caches() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let service = service(&dir, provider.clone(), true);
        let request = GenerationRequest::new("a paper crane");

        let first = service.generate(&request).await.unwrap();
        assert!(!first.cached);
        assert!(first.image_url.starts_with("data:image/png;base64,"));
        assert_eq!(first.metadata.dimensions, "1x1");
        assert_eq!(first.metadata.format, "PNG");
        assert!(first.resource_uri.starts_with("generated-images://img_"));

        let second = service.generate(&request).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.image_id, first.image_id);
        assert_eq!(second.image_url, first.resource_uri);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generate_sidecar_records_request() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Arc::new(FakeProvider::default()), true);

        let result = service
            .generate(&GenerationRequest::new("a paper crane"))
            .await
            .unwrap();
        let (bytes, doc) = service.storage.load(&result.image_id).await.unwrap();

        assert_eq!(bytes, png_1x1());
        assert_eq!(doc["prompt"], json!("a paper crane"));
        assert_eq!(doc["operation"], json!("generate"));
        assert_eq!(doc["parameters"]["size"], json!("1536x1024"));
        assert_eq!(doc["api_response"]["created"], json!(1_700_000_000));
        assert_eq!(doc["task_id"], json!(result.task_id));
    }

    #[tokio::test]
    async fn test_disabled_cache_always_calls_provider() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let service = service(&dir, provider.clone(), false);
        let request = GenerationRequest::new("a paper crane");

        let a = service.generate(&request).await.unwrap();
        let b = service.generate(&request).await.unwrap();

        assert_ne!(a.image_id, b.image_id);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_provider_failure_is_wrapped() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(FakeProvider {
            fail: true,
            ..FakeProvider::default()
        });
        let service = service(&dir, provider, true);

        let err = service
            .generate(&GenerationRequest::new("a paper crane"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Provider { ref provider, .. } if provider == "fake"));
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(service.storage.stats().await.total_images, 0);
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_provider() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let service = service(&dir, provider.clone(), true);

        let err = service.generate(&GenerationRequest::new("")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_edit_cached_per_source_image() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let service = service(&dir, provider.clone(), true);

        let a = EditRequest::new("add a hat", b"source-a".to_vec());
        let b = EditRequest::new("add a hat", b"source-b".to_vec());

        let first = service.edit(&a).await.unwrap();
        assert!(service.edit(&a).await.unwrap().cached);
        assert!(!service.edit(&b).await.unwrap().cached);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        let (_, doc) = service.storage.load(&first.image_id).await.unwrap();
        assert_eq!(doc["has_mask"], json!(false));
        assert_eq!(doc["operation"], json!("edit"));
    }
}
