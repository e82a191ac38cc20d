//! Sidecar metadata documents.
//!
//! Every binary has a JSON sidecar next to it holding the caller's fields
//! plus `image_id`, `created_at` and `file_info`.

use std::io::Cursor;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::StorageResult;
use crate::storage::id::{parse_timestamp, ArtifactId};

/// Free-form JSON object carried in a sidecar.
pub type Metadata = serde_json::Map<String, Value>;

pub const UNKNOWN: &str = "unknown";

/// Keys the store owns; caller values under these names are replaced.
pub const RESERVED_KEYS: [&str; 3] = ["image_id", "created_at", "file_info"];

// == File Info ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub size_bytes: u64,
    /// Upper-cased extension, e.g. `PNG`
    pub format: String,
    /// `<width>x<height>`, or `unknown` when the header could not be read
    pub dimensions: String,
    pub path: String,
}

impl FileInfo {
    pub fn new(filename: String, bytes: &[u8], format: &str, path: String) -> Self {
        let dimensions = match probe_dimensions(bytes) {
            Some((w, h)) => format!("{}x{}", w, h),
            None => UNKNOWN.to_string(),
        };
        Self {
            filename,
            size_bytes: bytes.len() as u64,
            format: format.to_ascii_uppercase(),
            dimensions,
            path,
        }
    }
}

/// Reads pixel dimensions from the image header.
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// RFC 3339 with microseconds so documents sort by creation order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// == Builders ==
/// Merges caller metadata with the store-owned fields.
pub fn build_sidecar(
    id: &ArtifactId,
    created_at: DateTime<Utc>,
    file_info: &FileInfo,
    caller: Metadata,
) -> StorageResult<Metadata> {
    let mut doc = caller;
    for key in RESERVED_KEYS {
        if doc.contains_key(key) {
            warn!(image_id = %id, key, "Caller metadata key is reserved and will be replaced");
        }
    }
    doc.insert("image_id".to_string(), Value::String(id.to_string()));
    doc.insert(
        "created_at".to_string(),
        Value::String(format_timestamp(created_at)),
    );
    doc.insert("file_info".to_string(), serde_json::to_value(file_info)?);
    Ok(doc)
}

/// Minimal document returned when a sidecar is missing or unreadable.
pub fn stub(id: &str) -> Metadata {
    let mut doc = Metadata::new();
    doc.insert("image_id".to_string(), Value::String(id.to_string()));
    doc.insert("created_at".to_string(), Value::String(UNKNOWN.to_string()));
    doc
}

pub fn created_at(doc: &Metadata) -> &str {
    doc.get("created_at").and_then(Value::as_str).unwrap_or("")
}

/// Creation time of a document: `created_at` when it parses, otherwise
/// the timestamp embedded in `image_id`.
pub fn created_time(doc: &Metadata) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(created_at(doc))
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|| {
            doc.get("image_id")
                .and_then(Value::as_str)
                .and_then(parse_timestamp)
        })
}
