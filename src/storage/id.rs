//! Artifact identifiers and the date-partitioned path scheme.
//!
//! An id looks like `img_<YYYYMMDDHHMMSS>_<12 hex>`. The embedded timestamp
//! decides the partition, so an id always resolves to the same directory:
//!
//! ```text
//! <base>/images/<YYYY>/<MM>/<DD>/<image_id>.<ext>
//! <base>/images/<YYYY>/<MM>/<DD>/<image_id>.json
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

// == Constants ==
pub const ID_PREFIX: &str = "img";

/// Second-granularity timestamp embedded in every id
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Hex characters of random suffix (48 bits)
pub const SUFFIX_LEN: usize = 12;

/// Binary extensions probed on lookup, in order
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];

pub const SIDECAR_EXTENSION: &str = "json";

pub const IMAGES_DIR: &str = "images";

pub const RESOURCE_SCHEME: &str = "generated-images://";

// == Artifact Id ==
/// Opaque, time-sortable identifier of one stored image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Mints a fresh id stamped with `now`.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let random = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}_{}_{}",
            ID_PREFIX,
            now.format(TIMESTAMP_FORMAT),
            &random[..SUFFIX_LEN]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Creation time embedded in the id, if it follows the scheme.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.0)
    }

    /// `generated-images://<id>`
    pub fn resource_uri(&self) -> String {
        format!("{}{}", RESOURCE_SCHEME, self.0)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ArtifactId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ArtifactId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for ArtifactId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// == Parsing ==
/// Extracts the creation time from `img_<YYYYMMDDHHMMSS>_...`.
pub fn parse_timestamp(id: &str) -> Option<DateTime<Utc>> {
    let mut parts = id.split('_');
    if parts.next()? != ID_PREFIX {
        return None;
    }
    let stamp = parts.next()?;
    if stamp.len() != 14 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Ids become file names; anything that could escape the partition is refused.
pub fn is_path_safe(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0'])
}

// == Partitioning ==
/// Date bucket for an id.
///
/// Ids whose timestamp cannot be parsed land in `today`'s bucket. This is a
/// degraded mode, so it is logged.
pub fn partition_date(id: &str, today: NaiveDate) -> NaiveDate {
    match parse_timestamp(id) {
        Some(ts) => ts.date_naive(),
        None => {
            warn!(
                image_id = id,
                fallback = %today,
                "Image id has no parseable timestamp, using today's partition"
            );
            today
        }
    }
}

/// `<base>/images/YYYY/MM/DD`
pub fn partition_dir(base: &Path, date: NaiveDate) -> PathBuf {
    base.join(IMAGES_DIR)
        .join(date.format("%Y").to_string())
        .join(date.format("%m").to_string())
        .join(date.format("%d").to_string())
}

/// Full path of the binary for `id` with extension `ext`.
pub fn resolve_path(base: &Path, id: &str, ext: &str, today: NaiveDate) -> PathBuf {
    let dir = partition_dir(base, partition_date(id, today));
    dir.join(file_name(id, ext))
}

/// Full path of the JSON sidecar for `id`.
pub fn sidecar_path(base: &Path, id: &str, today: NaiveDate) -> PathBuf {
    resolve_path(base, id, SIDECAR_EXTENSION, today)
}

/// Relative URL path, e.g. `images/2024/01/15/img_20240115123456_abc123def456.png`.
pub fn url_path(id: &str, ext: &str, today: NaiveDate) -> String {
    let date = partition_date(id, today);
    format!(
        "{}/{}/{}",
        IMAGES_DIR,
        date.format("%Y/%m/%d"),
        file_name(id, ext)
    )
}

fn file_name(id: &str, ext: &str) -> String {
    format!("{}.{}", id, ext.to_ascii_lowercase())
}

// == Lookup ==
/// Probes every supported extension in the id's partition.
///
/// Returns the first binary that exists, or `None`.
pub async fn find_existing(base: &Path, id: &str, today: NaiveDate) -> Option<PathBuf> {
    if !is_path_safe(id) {
        return None;
    }
    let dir = partition_dir(base, partition_date(id, today));
    for ext in SUPPORTED_EXTENSIONS {
        let candidate = dir.join(file_name(id, ext));
        if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return Some(candidate);
        }
    }
    None
}
