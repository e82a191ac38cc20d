//! Storage Manager
//!
//! Persists image binaries with JSON sidecars under the date-partitioned
//! layout, answers listing and statistics queries, and enforces the
//! age and size retention bounds.
//!
//! Request-path operations (`save`, `load`, `delete`) return errors to the
//! caller. Maintenance operations (`initialize`, listing, stats, cleanup)
//! log failures and keep going. Writers and the cleanup scanner share the
//! tree without a lock, so files vanishing mid-scan are expected.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::storage::id::{
    self, parse_timestamp, ArtifactId, IMAGES_DIR, SIDECAR_EXTENSION, SUPPORTED_EXTENSIONS,
};
use crate::storage::metadata::{self, FileInfo, Metadata};
use crate::storage::stats::{bytes_to_mb, CleanupReport, StorageStats};

const CACHE_DIR: &str = "cache";
const LOGS_DIR: &str = "logs";

// == Scanned Artifact ==
/// Files sharing one id inside a day directory.
#[derive(Debug, Clone)]
struct ScannedArtifact {
    id: String,
    created: DateTime<Utc>,
    /// (path, size, is_binary)
    files: Vec<(PathBuf, u64, bool)>,
    size_bytes: u64,
    has_binary: bool,
}

// == Storage Manager ==
#[derive(Debug)]
pub struct StorageManager {
    config: StorageConfig,
    base_path: PathBuf,
    images_path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl StorageManager {
    // == Constructors ==
    pub fn new(config: StorageConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a manager that reads the time from `clock`.
    pub fn with_clock(config: StorageConfig, clock: Arc<dyn Clock>) -> Self {
        let base_path = config.base_path.clone();
        let images_path = base_path.join(IMAGES_DIR);
        Self {
            config,
            base_path,
            images_path,
            clock,
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn images_path(&self) -> &Path {
        &self.images_path
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    // == Initialize ==
    /// Creates the directory skeleton. Safe to call repeatedly.
    ///
    /// A directory that cannot be created is logged and skipped; the
    /// request path will report the real error if it ever needs it.
    pub async fn initialize(&self) {
        let dirs = [
            self.base_path.clone(),
            self.images_path.clone(),
            self.base_path.join(CACHE_DIR),
            self.base_path.join(LOGS_DIR),
        ];
        for dir in dirs {
            if let Err(e) = fs::create_dir_all(&dir).await {
                warn!(
                    path = %dir.display(),
                    error = %e,
                    "Failed to create storage directory, continuing in degraded mode"
                );
            }
        }
        info!(base_path = %self.base_path.display(), "Storage initialized");
    }

    // == Paths ==
    /// Deterministic location of the binary for `id`.
    pub fn image_path(&self, id: &str, ext: &str) -> PathBuf {
        id::resolve_path(&self.base_path, id, ext, self.today())
    }

    pub fn metadata_path(&self, id: &str) -> PathBuf {
        id::sidecar_path(&self.base_path, id, self.today())
    }

    /// Relative URL path for serving the binary.
    pub fn url_path(&self, id: &str, ext: &str) -> String {
        id::url_path(id, ext, self.today())
    }

    /// Existing binary for `id` under any supported extension.
    pub async fn find(&self, id: &str) -> Option<PathBuf> {
        id::find_existing(&self.base_path, id, self.today()).await
    }

    // == Save ==
    /// Writes `bytes` and its sidecar under a freshly minted id.
    ///
    /// Ids are unique by construction, so concurrent saves never touch the
    /// same files.
    pub async fn save(
        &self,
        bytes: &[u8],
        caller_metadata: Metadata,
        format: &str,
    ) -> StorageResult<(ArtifactId, PathBuf)> {
        let ext = format.trim().to_ascii_lowercase();
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(StorageError::UnsupportedFormat(format.to_string()));
        }

        let now = self.clock.now();
        let id = ArtifactId::generate(now);
        let today = now.date_naive();
        let image_path = id::resolve_path(&self.base_path, id.as_str(), &ext, today);
        let sidecar_path = id::sidecar_path(&self.base_path, id.as_str(), today);

        if let Some(dir) = image_path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::io(dir, e))?;
        }

        fs::write(&image_path, bytes)
            .await
            .map_err(|e| StorageError::io(&image_path, e))?;

        let filename = format!("{}.{}", id, ext);
        let file_info = FileInfo::new(
            filename,
            bytes,
            &ext,
            image_path.display().to_string(),
        );

        let written = match metadata::build_sidecar(&id, now, &file_info, caller_metadata) {
            Ok(doc) => match serde_json::to_vec_pretty(&doc) {
                Ok(raw) => fs::write(&sidecar_path, raw)
                    .await
                    .map_err(|e| StorageError::io(&sidecar_path, e)),
                Err(e) => Err(StorageError::Metadata(e)),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            // Don't leave a binary behind for a failed request
            if let Err(rm) = fs::remove_file(&image_path).await {
                warn!(path = %image_path.display(), error = %rm, "Failed to remove orphaned image");
            }
            return Err(e);
        }

        info!(
            image_id = %id,
            path = %image_path.display(),
            size_bytes = bytes.len(),
            dimensions = %file_info.dimensions,
            "Saved image"
        );
        Ok((id, image_path))
    }

    // == Load ==
    /// Reads the binary and its sidecar.
    ///
    /// A missing or unparsable sidecar yields a metadata stub; only a
    /// missing binary is `NotFound`.
    pub async fn load(&self, id: &str) -> StorageResult<(Vec<u8>, Metadata)> {
        let path = self
            .find(id)
            .await
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        let bytes = fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(id.to_string()),
            _ => StorageError::io(&path, e),
        })?;

        let metadata = self.read_sidecar(id).await;
        Ok((bytes, metadata))
    }

    /// Sidecar for an existing image, without reading the binary.
    pub async fn metadata(&self, id: &str) -> StorageResult<Metadata> {
        if self.find(id).await.is_none() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(self.read_sidecar(id).await)
    }

    async fn read_sidecar(&self, id: &str) -> Metadata {
        let path = self.metadata_path(id);
        match fs::read(&path).await {
            Ok(raw) => match serde_json::from_slice::<Metadata>(&raw) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(image_id = id, error = %e, "Corrupt metadata sidecar, returning stub");
                    metadata::stub(id)
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(image_id = id, "No metadata sidecar, returning stub");
                metadata::stub(id)
            }
            Err(e) => {
                warn!(image_id = id, error = %e, "Unreadable metadata sidecar, returning stub");
                metadata::stub(id)
            }
        }
    }

    // == Delete ==
    /// Removes the binary and its sidecar.
    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        let path = self
            .find(id)
            .await
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_string()));
            }
            Err(e) => return Err(StorageError::io(&path, e)),
        }

        let sidecar = self.metadata_path(id);
        if let Err(e) = fs::remove_file(&sidecar).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(image_id = id, error = %e, "Failed to remove metadata sidecar");
            }
        }

        info!(image_id = id, "Deleted image");
        Ok(())
    }

    // == List Recent ==
    /// Sidecars created within the last `days` days, newest first, at most
    /// `limit`.
    ///
    /// Date directories before the cutoff day are skipped without being
    /// opened. Inside the cutoff day each document's creation time decides;
    /// a document with no usable time takes midnight of its directory date.
    pub async fn list_recent(&self, limit: usize, days: u32) -> Vec<Metadata> {
        let cutoff = self.clock.now() - Duration::days(i64::from(days));
        let mut found = Vec::new();

        for (date, day_dir) in self.date_dirs(Some(cutoff.date_naive())).await {
            let midnight = date.and_hms_opt(0, 0, 0).map(|d| d.and_utc());
            for (path, _) in list_files(&day_dir).await {
                if !has_extension(&path, SIDECAR_EXTENSION) {
                    continue;
                }
                let parsed = match fs::read(&path).await {
                    Ok(raw) => serde_json::from_slice::<Metadata>(&raw).ok(),
                    Err(_) => None,
                };
                let Some(doc) = parsed else {
                    debug!(path = %path.display(), "Skipping unreadable sidecar");
                    continue;
                };
                let created = metadata::created_time(&doc).or(midnight);
                if created.is_some_and(|c| c >= cutoff) {
                    found.push(doc);
                }
            }
        }

        found.sort_by(|a, b| metadata::created_at(b).cmp(metadata::created_at(a)));
        found.truncate(limit);
        found
    }

    // == Stats ==
    /// Full scan of the image tree.
    pub async fn stats(&self) -> StorageStats {
        let artifacts = self.scan().await;
        let total_bytes: u64 = artifacts.iter().map(|a| a.size_bytes).sum();
        let images = artifacts.iter().filter(|a| a.has_binary);

        let mut total_images = 0;
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut newest: Option<DateTime<Utc>> = None;
        for artifact in images {
            total_images += 1;
            oldest = Some(oldest.map_or(artifact.created, |o| o.min(artifact.created)));
            newest = Some(newest.map_or(artifact.created, |n| n.max(artifact.created)));
        }

        StorageStats {
            total_images,
            total_size_mb: bytes_to_mb(total_bytes),
            oldest_image: oldest,
            newest_image: newest,
            retention_days: self.config.retention_days,
            max_size_gb: self.config.max_size_gb,
            base_path: self.base_path.display().to_string(),
        }
    }

    // == Cleanup By Age ==
    /// Deletes every artifact created before `now - retention_days`.
    pub async fn cleanup_by_age(&self) -> CleanupReport {
        let cutoff = self.clock.now() - Duration::days(i64::from(self.config.retention_days));
        let mut report = CleanupReport::default();

        for artifact in self.scan().await {
            if artifact.created >= cutoff {
                continue;
            }
            let (complete, freed) = remove_artifact(&artifact).await;
            report.freed_bytes += freed;
            if complete {
                report.removed += 1;
            } else {
                report.failed += 1;
            }
        }

        if report.removed > 0 || report.failed > 0 {
            info!(
                removed = report.removed,
                failed = report.failed,
                freed_bytes = report.freed_bytes,
                retention_days = self.config.retention_days,
                "Age cleanup finished"
            );
        } else {
            debug!("Age cleanup: nothing to remove");
        }
        report
    }

    // == Cleanup By Size ==
    /// Deletes oldest artifacts until the tree fits within `max_size_gb`.
    ///
    /// The running total is decremented per deletion, so the tree is only
    /// scanned once and eviction stops as soon as the bound is met.
    pub async fn cleanup_by_size(&self) -> CleanupReport {
        let limit = self.config.max_size_bytes();
        let mut artifacts = self.scan().await;
        let mut total: u64 = artifacts.iter().map(|a| a.size_bytes).sum();
        let mut report = CleanupReport::default();

        if total <= limit {
            debug!(total_bytes = total, limit_bytes = limit, "Size cleanup: within bound");
            return report;
        }

        artifacts.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));

        for artifact in &artifacts {
            if total <= limit {
                break;
            }
            let (complete, freed) = remove_artifact(artifact).await;
            total = total.saturating_sub(freed);
            report.freed_bytes += freed;
            if complete {
                report.removed += 1;
            } else {
                report.failed += 1;
            }
        }

        info!(
            removed = report.removed,
            failed = report.failed,
            freed_bytes = report.freed_bytes,
            remaining_bytes = total,
            limit_bytes = limit,
            "Size cleanup finished"
        );
        report
    }

    /// Age cleanup followed by size cleanup.
    pub async fn run_cleanup(&self) -> CleanupReport {
        let by_age = self.cleanup_by_age().await;
        let by_size = self.cleanup_by_size().await;
        by_age.merge(by_size)
    }

    // == Tree Walking ==
    /// Day directories, oldest first, optionally pruned below `since`.
    async fn date_dirs(&self, since: Option<NaiveDate>) -> Vec<(NaiveDate, PathBuf)> {
        let mut out = Vec::new();
        let floor = since.map(|s| (s.year() as u32, s.month()));

        for (year, year_dir) in numeric_dirs(&self.images_path).await {
            if floor.is_some_and(|(y, _)| year < y) {
                continue;
            }
            for (month, month_dir) in numeric_dirs(&year_dir).await {
                if floor.is_some_and(|f| (year, month) < f) {
                    continue;
                }
                for (day, day_dir) in numeric_dirs(&month_dir).await {
                    let Some(date) = NaiveDate::from_ymd_opt(year as i32, month, day) else {
                        continue;
                    };
                    if since.is_some_and(|s| date < s) {
                        continue;
                    }
                    out.push((date, day_dir));
                }
            }
        }
        out
    }

    /// Groups every binary and sidecar in the tree by id.
    async fn scan(&self) -> Vec<ScannedArtifact> {
        let mut artifacts = Vec::new();

        for (date, day_dir) in self.date_dirs(None).await {
            let mut grouped: BTreeMap<String, (Vec<(PathBuf, u64, bool)>, Option<DateTime<Utc>>)> =
                BTreeMap::new();

            for (path, meta) in list_files(&day_dir).await {
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
                    continue;
                };
                let ext = ext.to_ascii_lowercase();
                let is_binary = SUPPORTED_EXTENSIONS.contains(&ext.as_str());
                if !is_binary && ext != SIDECAR_EXTENSION {
                    continue;
                }

                let modified = meta.modified().ok().map(DateTime::<Utc>::from);
                let slot = grouped.entry(stem.to_string()).or_default();
                slot.1 = match (slot.1, modified) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
                slot.0.push((path.clone(), meta.len(), is_binary));
            }

            let midnight = date.and_hms_opt(0, 0, 0).map(|d| d.and_utc());
            for (id, (files, modified)) in grouped {
                // Prefer the id's own timestamp; foreign ids fall back to mtime
                let Some(created) = parse_timestamp(&id).or(modified).or(midnight) else {
                    continue;
                };
                let size_bytes = files.iter().map(|(_, size, _)| size).sum();
                let has_binary = files.iter().any(|(_, _, binary)| *binary);
                artifacts.push(ScannedArtifact {
                    id,
                    created,
                    files,
                    size_bytes,
                    has_binary,
                });
            }
        }

        artifacts
    }
}

// == Helpers ==
/// Deletes an artifact's files, binary first and sidecar last.
///
/// Returns whether every file is gone and how many bytes were released.
/// Files that vanished concurrently count as removed, with their scanned
/// size released.
async fn remove_artifact(artifact: &ScannedArtifact) -> (bool, u64) {
    let mut files: Vec<&(PathBuf, u64, bool)> = artifact.files.iter().collect();
    files.sort_by_key(|(_, _, is_binary)| !*is_binary);

    let mut complete = true;
    let mut freed = 0;
    for (path, size, _) in files {
        match fs::remove_file(path).await {
            Ok(()) => freed += size,
            Err(e) if e.kind() == ErrorKind::NotFound => freed += size,
            Err(e) => {
                complete = false;
                warn!(
                    image_id = %artifact.id,
                    path = %path.display(),
                    error = %e,
                    "Failed to delete file during cleanup"
                );
            }
        }
    }
    (complete, freed)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Child directories whose names are all digits, sorted numerically.
async fn numeric_dirs(dir: &Path) -> Vec<(u32, PathBuf)> {
    let mut out = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %dir.display(), error = %e, "Failed to read storage directory");
            }
            return out;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let name = entry.file_name();
                let Some(number) = name
                    .to_str()
                    .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
                    .and_then(|s| s.parse::<u32>().ok())
                else {
                    continue;
                };
                if matches!(entry.file_type().await, Ok(ft) if ft.is_dir()) {
                    out.push((number, entry.path()));
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Directory listing interrupted");
                break;
            }
        }
    }

    out.sort_by_key(|(number, _)| *number);
    out
}

/// Entries of `dir` with their metadata. Entries that disappear between
/// listing and stat are skipped.
///
/// Anything that is not a regular file is still returned, so an artifact
/// name taken by a directory surfaces as a failed deletion in cleanup.
async fn list_files(dir: &Path) -> Vec<(PathBuf, std::fs::Metadata)> {
    let mut out = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "Day directory unavailable");
            return out;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => match entry.metadata().await {
                Ok(meta) => out.push((entry.path(), meta)),
                Err(e) => debug!(path = %entry.path().display(), error = %e, "File vanished during scan"),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Directory listing interrupted");
                break;
            }
        }
    }
    out
}
