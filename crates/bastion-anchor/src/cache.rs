//! Local cache of anchored and unanchored batches.
//!
//! ```text
//! <cache_root>/
//!   batch_<id>.json            {"submission": {...}, "records": [...]}
//!   unanchored/
//!     batch_<id>.json          a sealed Batch whose anchoring was abandoned
//! ```
//!
//! Anchored entries hold everything needed to regenerate an inclusion proof
//! offline. All writes go through `write_atomic`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::warn;

use bastion_audit::write_atomic;
use bastion_contracts::{
    batch::{AnchorSubmission, Batch},
    error::{BastionError, BastionResult},
    record::AuditRecord,
};

const UNANCHORED_DIR: &str = "unanchored";

/// One anchored batch on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedBatch {
    pub submission: AnchorSubmission,
    /// Records in leaf order.
    pub records: Vec<AuditRecord>,
}

#[derive(Debug, Clone)]
pub struct BatchCache {
    root: PathBuf,
}

impl BatchCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unanchored_dir(&self) -> PathBuf {
        self.root.join(UNANCHORED_DIR)
    }

    fn entry_path(dir: &Path, batch_id: &str) -> BastionResult<PathBuf> {
        let safe = batch_id.starts_with("batch_")
            && batch_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !safe {
            return Err(BastionError::StorageError {
                reason: format!("refusing to cache batch with unsafe id '{}'", batch_id),
            });
        }
        Ok(dir.join(format!("{}.json", batch_id)))
    }

    // ── Anchored ──────────────────────────────────────────────────────────────

    /// Write (or overwrite) the entry for `entry.submission.batch_id`.
    pub fn put(&self, entry: &CachedBatch) -> BastionResult<PathBuf> {
        let path = Self::entry_path(&self.root, &entry.submission.batch_id)?;
        write_atomic(&path, &encode(entry)?)?;
        Ok(path)
    }

    pub fn get(&self, batch_id: &str) -> BastionResult<Option<CachedBatch>> {
        let path = Self::entry_path(&self.root, batch_id)?;
        if !path.is_file() {
            return Ok(None);
        }
        decode(&path).map(Some)
    }

    /// Every readable anchored entry, ordered by file name.
    ///
    /// Corrupt files are skipped with a warning.
    pub fn entries(&self) -> BastionResult<Vec<CachedBatch>> {
        batch_files(&self.root)?
            .into_iter()
            .filter_map(|path| match decode::<CachedBatch>(&path) {
                Ok(entry) => Some(Ok(entry)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt cache entry");
                    None
                }
            })
            .collect()
    }

    /// The anchored entry containing `record_id`, if any.
    pub fn find_record(&self, record_id: &str) -> BastionResult<Option<CachedBatch>> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|entry| entry.records.iter().any(|r| r.record_id == record_id)))
    }

    // ── Unanchored ────────────────────────────────────────────────────────────

    /// Keep a batch whose anchoring was abandoned so it can be retried.
    pub fn park(&self, batch: &Batch) -> BastionResult<PathBuf> {
        let path = Self::entry_path(&self.unanchored_dir(), batch.batch_id())?;
        write_atomic(&path, &encode(batch)?)?;
        Ok(path)
    }

    /// Parked batches, oldest first.
    pub fn parked(&self) -> BastionResult<Vec<Batch>> {
        let mut batches: Vec<Batch> = batch_files(&self.unanchored_dir())?
            .into_iter()
            .filter_map(|path| match decode::<Batch>(&path) {
                Ok(batch) => Some(batch),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt parked batch");
                    None
                }
            })
            .collect();
        batches.sort_by_key(|b| b.created_at());
        Ok(batches)
    }

    /// Remove a parked batch. Missing files are not an error.
    pub fn unpark(&self, batch_id: &str) -> BastionResult<()> {
        let path = Self::entry_path(&self.unanchored_dir(), batch_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BastionError::StorageError {
                reason: format!("failed to remove '{}': {}", path.display(), e),
            }),
        }
    }
}

/// `batch_*.json` files directly under `dir`, sorted. A missing directory
/// has no files.
fn batch_files(dir: &Path) -> BastionResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(BastionError::StorageError {
                reason: format!("failed to read directory '{}': {}", dir.display(), e),
            })
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("batch_") && n.ends_with(".json"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

fn encode<T: Serialize>(value: &T) -> BastionResult<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| BastionError::StorageError {
        reason: format!("failed to encode cache entry: {}", e),
    })
}

fn decode<T: for<'de> Deserialize<'de>>(path: &Path) -> BastionResult<T> {
    let bytes = fs::read(path).map_err(|e| BastionError::StorageError {
        reason: format!("failed to read '{}': {}", path.display(), e),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| BastionError::StorageError {
        reason: format!("failed to parse '{}': {}", path.display(), e),
    })
}
