//! Request parameter enums
//!
//! Closed sets of values accepted by the generate and edit flows. Free-form
//! input is folded onto a variant by [`RequestParam::normalize`], which
//! accepts canonical values, variant names and common aliases, and falls
//! back to the default for anything else. Request bodies go through the
//! same lookup when they are deserialized.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

// == Request Param ==
pub trait RequestParam: Sized + Copy + Default + 'static {
    /// Human name used in log lines
    const NAME: &'static str;
    const ALL: &'static [Self];

    /// Canonical wire value
    fn as_str(&self) -> &'static str;

    /// Variant name, matched case-insensitively
    fn name(&self) -> &'static str;

    /// Extra spellings, given lowercase trimmed input
    fn alias(_input: &str) -> Option<Self> {
        None
    }

    /// Strict lookup: canonical value, variant name, then alias.
    fn parse(raw: &str) -> Option<Self> {
        let input = raw.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == input || v.name() == input)
            .or_else(|| Self::alias(&input))
    }

    /// Lenient lookup: unknown input becomes the default, with a warning.
    fn normalize(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| {
            let fallback = Self::default();
            warn!(
                param = Self::NAME,
                value = raw,
                default = fallback.as_str(),
                "Unrecognized parameter value, using default"
            );
            fallback
        })
    }

    /// Lenient lookup where an absent value means the default.
    fn normalize_opt(raw: Option<&str>) -> Self {
        raw.map(Self::normalize).unwrap_or_default()
    }
}

// == Image Quality ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Auto,
    High,
    Medium,
    Low,
}

impl RequestParam for ImageQuality {
    const NAME: &'static str = "quality";
    const ALL: &'static [Self] = &[Self::Auto, Self::High, Self::Medium, Self::Low];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn alias(input: &str) -> Option<Self> {
        match input {
            "standard" | "best" | "maximum" | "3" => Some(Self::High),
            "good" | "normal" | "average" | "2" => Some(Self::Medium),
            "fast" | "quick" | "draft" | "preview" | "1" => Some(Self::Low),
            "0" => Some(Self::Auto),
            _ => None,
        }
    }
}

// == Image Size ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ImageSize {
    #[serde(rename = "1024x1024")]
    Square,
    #[default]
    #[serde(rename = "1536x1024")]
    Landscape,
    #[serde(rename = "1024x1536")]
    Portrait,
    #[serde(rename = "auto")]
    Auto,
}

impl RequestParam for ImageSize {
    const NAME: &'static str = "size";
    const ALL: &'static [Self] = &[Self::Square, Self::Landscape, Self::Portrait, Self::Auto];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Landscape => "1536x1024",
            Self::Portrait => "1024x1536",
            Self::Auto => "auto",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Auto => "auto",
        }
    }

    fn alias(input: &str) -> Option<Self> {
        match input {
            "1024" => Some(Self::Square),
            "wide" => Some(Self::Landscape),
            "tall" => Some(Self::Portrait),
            _ => None,
        }
    }
}

// == Image Style ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Vivid,
    Natural,
}

impl RequestParam for ImageStyle {
    const NAME: &'static str = "style";
    const ALL: &'static [Self] = &[Self::Vivid, Self::Natural];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Vivid => "vivid",
            Self::Natural => "natural",
        }
    }

    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn alias(input: &str) -> Option<Self> {
        match input {
            "realistic" | "photo" | "photographic" => Some(Self::Natural),
            "bright" | "colorful" | "saturated" => Some(Self::Vivid),
            _ => None,
        }
    }
}

// == Moderation Level ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationLevel {
    #[default]
    Auto,
    Low,
}

impl RequestParam for ModerationLevel {
    const NAME: &'static str = "moderation";
    const ALL: &'static [Self] = &[Self::Auto, Self::Low];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Low => "low",
        }
    }

    fn name(&self) -> &'static str {
        self.as_str()
    }
}

// == Output Format ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn supports_transparency(&self) -> bool {
        matches!(self, Self::Png | Self::Webp)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

impl RequestParam for OutputFormat {
    const NAME: &'static str = "output_format";
    const ALL: &'static [Self] = &[Self::Png, Self::Jpeg, Self::Webp];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        }
    }

    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn alias(input: &str) -> Option<Self> {
        match input {
            "jpg" => Some(Self::Jpeg),
            _ => None,
        }
    }
}

// == Background Type ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundType {
    #[default]
    Auto,
    Transparent,
    Opaque,
}

impl BackgroundType {
    /// A transparent background needs a format with an alpha channel.
    pub fn is_compatible_with(&self, format: OutputFormat) -> bool {
        match self {
            Self::Transparent => format.supports_transparency(),
            _ => true,
        }
    }
}

impl RequestParam for BackgroundType {
    const NAME: &'static str = "background";
    const ALL: &'static [Self] = &[Self::Auto, Self::Transparent, Self::Opaque];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Transparent => "transparent",
            Self::Opaque => "opaque",
        }
    }

    fn name(&self) -> &'static str {
        self.as_str()
    }

    fn alias(input: &str) -> Option<Self> {
        match input {
            "none" | "clear" | "remove" => Some(Self::Transparent),
            "solid" => Some(Self::Opaque),
            _ => None,
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(
    ImageQuality,
    ImageSize,
    ImageStyle,
    ModerationLevel,
    OutputFormat,
    BackgroundType
);

// Strings, bare numbers (`"quality": 2`) and null all go through `normalize`
macro_rules! deserialize_normalized {
    ($($ty:ty),*) => {
        $(
            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    Ok(match Value::deserialize(deserializer)? {
                        Value::Null => Self::normalize_opt(None),
                        Value::String(raw) => Self::normalize(&raw),
                        other => Self::normalize(&other.to_string()),
                    })
                }
            }
        )*
    };
}

deserialize_normalized!(
    ImageQuality,
    ImageSize,
    ImageStyle,
    ModerationLevel,
    OutputFormat,
    BackgroundType
);

// == Compression ==
pub const DEFAULT_COMPRESSION: u8 = 100;

/// Clamps an output compression level into 0..=100.
pub fn clamp_compression(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_aliases() {
        for raw in ["square", "SQUARE", "1024", "1024x1024", " 1024X1024 "] {
            assert_eq!(ImageSize::normalize(raw), ImageSize::Square, "{raw}");
        }
        for raw in ["landscape", "wide", "1536x1024"] {
            assert_eq!(ImageSize::normalize(raw), ImageSize::Landscape, "{raw}");
        }
        for raw in ["portrait", "tall", "1024x1536"] {
            assert_eq!(ImageSize::normalize(raw), ImageSize::Portrait, "{raw}");
        }
    }

    #[test]
    fn test_unknown_falls_back_to_default() {
        assert_eq!(ImageSize::normalize("800x600"), ImageSize::Landscape);
        assert_eq!(ImageQuality::normalize("ultra"), ImageQuality::Auto);
        assert_eq!(ImageStyle::normalize(""), ImageStyle::Vivid);
        assert_eq!(OutputFormat::normalize_opt(None), OutputFormat::Png);
        assert!(ImageSize::parse("800x600").is_none());
    }

    #[test]
    fn test_quality_aliases() {
        assert_eq!(ImageQuality::normalize("draft"), ImageQuality::Low);
        assert_eq!(ImageQuality::normalize("standard"), ImageQuality::High);
        assert_eq!(ImageQuality::normalize("2"), ImageQuality::Medium);
        assert_eq!(ImageQuality::normalize("Medium"), ImageQuality::Medium);
    }

    #[test]
    fn test_format_and_background() {
        assert_eq!(OutputFormat::normalize("JPG"), OutputFormat::Jpeg);
        assert_eq!(OutputFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(BackgroundType::normalize("clear"), BackgroundType::Transparent);
        assert!(!BackgroundType::Transparent.is_compatible_with(OutputFormat::Jpeg));
        assert!(BackgroundType::Transparent.is_compatible_with(OutputFormat::Webp));
        assert!(BackgroundType::Opaque.is_compatible_with(OutputFormat::Jpeg));
    }

    #[test]
    fn test_style_and_moderation() {
        assert_eq!(ImageStyle::normalize("photo"), ImageStyle::Natural);
        assert_eq!(ModerationLevel::normalize("LOW"), ModerationLevel::Low);
    }

    #[test]
    fn test_serde_uses_wire_values() {
        assert_eq!(serde_json::to_string(&ImageSize::Portrait).unwrap(), "\"1024x1536\"");
        let parsed: OutputFormat = serde_json::from_str("\"webp\"").unwrap();
        assert_eq!(parsed, OutputFormat::Webp);
        assert_eq!(ImageSize::Square.to_string(), "1024x1024");
    }

    #[test]
    fn test_deserialize_accepts_aliases() {
        let size: ImageSize = serde_json::from_str("\"square\"").unwrap();
        let format: OutputFormat = serde_json::from_str("\"JPG\"").unwrap();
        let quality: ImageQuality = serde_json::from_str("2").unwrap();
        let background: BackgroundType = serde_json::from_str("null").unwrap();
        let style: ImageStyle = serde_json::from_str("\"sepia\"").unwrap();

        assert_eq!(size, ImageSize::Square);
        assert_eq!(format, OutputFormat::Jpeg);
        assert_eq!(quality, ImageQuality::Medium);
        assert_eq!(background, BackgroundType::Auto);
        assert_eq!(style, ImageStyle::Vivid);
    }

    #[test]
    fn test_clamp_compression() {
        assert_eq!(clamp_compression(-5), 0);
        assert_eq!(clamp_compression(55), 55);
        assert_eq!(clamp_compression(1000), 100);
    }
}
