//! Request DTOs
//!
//! Generation and edit requests handed to the image service, and the query
//! string of the listing endpoint.

use serde::{Deserialize, Deserializer};

use crate::cache::CacheParams;
use crate::models::params::{
    BackgroundType, ImageQuality, ImageSize, ImageStyle, ModerationLevel, OutputFormat,
    clamp_compression, RequestParam, DEFAULT_COMPRESSION,
};

// == Generation Request ==
/// A text-to-image request with normalized parameters.
///
/// Enum fields accept aliases on the wire (`"square"`, `"jpg"`, ...) and
/// fall back to their defaults for unknown values. Compression is clamped
/// into 0..=100.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub quality: ImageQuality,
    #[serde(default)]
    pub size: ImageSize,
    #[serde(default)]
    pub style: ImageStyle,
    #[serde(default)]
    pub moderation: ModerationLevel,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_compression", deserialize_with = "lenient_compression")]
    pub compression: u8,
    #[serde(default)]
    pub background: BackgroundType,
}

impl GenerationRequest {
    /// A request for `prompt` with every other parameter at its default.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            quality: ImageQuality::default(),
            size: ImageSize::default(),
            style: ImageStyle::default(),
            moderation: ModerationLevel::default(),
            output_format: OutputFormat::default(),
            compression: DEFAULT_COMPRESSION,
            background: BackgroundType::default(),
        }
    }

    /// Every parameter that changes the provider's output, plus the model.
    pub fn cache_params(&self, model: &str) -> CacheParams {
        CacheParams::new()
            .with("prompt", self.prompt.as_str())
            .with("quality", self.quality.as_str())
            .with("size", self.size.as_str())
            .with("style", self.style.as_str())
            .with("moderation", self.moderation.as_str())
            .with("output_format", self.output_format.as_str())
            .with("compression", self.compression)
            .with("background", self.background.as_str())
            .with("model", model)
    }

    /// Returns an error message if the request cannot be served.
    pub fn validate(&self) -> Option<String> {
        validate_common(&self.prompt, self.background, self.output_format)
    }
}

// == Edit Request ==
/// Instructions for editing a caller-supplied source image.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    pub prompt: String,
    pub source_image: Vec<u8>,
    pub mask: Option<Vec<u8>>,
    pub quality: ImageQuality,
    pub size: ImageSize,
    pub output_format: OutputFormat,
    pub compression: u8,
    pub background: BackgroundType,
}

impl EditRequest {
    pub fn new(prompt: impl Into<String>, source_image: Vec<u8>) -> Self {
        Self {
            prompt: prompt.into(),
            source_image,
            mask: None,
            quality: ImageQuality::default(),
            size: ImageSize::default(),
            output_format: OutputFormat::default(),
            compression: DEFAULT_COMPRESSION,
            background: BackgroundType::default(),
        }
    }

    /// Parameters for the edit cache key.
    ///
    /// The source image is folded in by the cache manager; the mask enters
    /// by content hash.
    pub fn cache_params(&self, model: &str) -> CacheParams {
        let params = CacheParams::new()
            .with("prompt", self.prompt.as_str())
            .with("quality", self.quality.as_str())
            .with("size", self.size.as_str())
            .with("output_format", self.output_format.as_str())
            .with("compression", self.compression)
            .with("background", self.background.as_str())
            .with("model", model);

        match &self.mask {
            Some(mask) => params.with_binary("mask_data", mask),
            None => params.with("mask_data", serde_json::Value::Null),
        }
    }

    pub fn validate(&self) -> Option<String> {
        if self.source_image.is_empty() {
            return Some("Source image cannot be empty".to_string());
        }
        validate_common(&self.prompt, self.background, self.output_format)
    }
}

fn validate_common(prompt: &str, background: BackgroundType, format: OutputFormat) -> Option<String> {
    if prompt.trim().is_empty() {
        return Some("Prompt cannot be empty".to_string());
    }
    if !background.is_compatible_with(format) {
        return Some(format!(
            "Background '{}' is not supported by output format '{}'",
            background, format
        ));
    }
    None
}

fn default_compression() -> u8 {
    DEFAULT_COMPRESSION
}

fn lenient_compression<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.map_or(DEFAULT_COMPRESSION, clamp_compression))
}

// == Recent Images Query ==
pub const DEFAULT_RECENT_LIMIT: usize = 10;
pub const MAX_RECENT_LIMIT: usize = 100;
pub const DEFAULT_RECENT_DAYS: u32 = 7;
pub const MAX_RECENT_DAYS: u32 = 365;

/// Query string for `GET /images`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub days: Option<u32>,
}

impl RecentQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_RECENT_LIMIT)
    }

    pub fn days(&self) -> u32 {
        self.days.unwrap_or(DEFAULT_RECENT_DAYS)
    }

    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if !(1..=MAX_RECENT_LIMIT).contains(&self.limit()) {
            return Some(format!("limit must be between 1 and {}", MAX_RECENT_LIMIT));
        }
        if !(1..=MAX_RECENT_DAYS).contains(&self.days()) {
            return Some(format!("days must be between 1 and {}", MAX_RECENT_DAYS));
        }
        None
    }
}
