//! Date-partitioned on-disk record store.
//!
//! Layout:
//! ```text
//! <root>/
//!   2026-01-15/
//!     rec_<32 hex>.json     canonical JSON of one AuditRecord
//! ```
//!
//! The partition is the UTC date of the record's own timestamp. Files are
//! written to a temporary sibling and renamed into place, so a reader never
//! observes a half-written record.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use bastion_contracts::{
    error::{BastionError, BastionResult},
    record::AuditRecord,
};

use crate::{canonical::to_canonical_bytes, signer::require_valid_signature, signer::verify_signature};

const PARTITION_FORMAT: &str = "%Y-%m-%d";

/// Write `bytes` to `path` via a temporary file and an atomic rename.
///
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> BastionResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| storage_error("create directory", parent, e))?;
    }

    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path).map_err(|e| storage_error("create", &temp_path, e))?;
    file.write_all(bytes)
        .map_err(|e| storage_error("write", &temp_path, e))?;
    file.sync_all()
        .map_err(|e| storage_error("sync", &temp_path, e))?;

    fs::rename(&temp_path, path).map_err(|e| storage_error("rename", path, e))?;
    Ok(())
}

pub(crate) fn storage_error(op: &str, path: &Path, e: std::io::Error) -> BastionError {
    BastionError::StorageError {
        reason: format!("failed to {} '{}': {}", op, path.display(), e),
    }
}

/// UTC calendar date of an RFC 3339 timestamp.
pub fn partition_date(timestamp: &str) -> BastionResult<NaiveDate> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|ts| ts.with_timezone(&Utc).date_naive())
        .map_err(|e| BastionError::InvalidRecordField {
            field: "timestamp".to_string(),
            reason: format!("'{}' is not RFC 3339: {}", timestamp, e),
        })
}

/// Ids become file names, so only `[A-Za-z0-9_-]` is accepted.
fn validate_record_id(record_id: &str) -> BastionResult<()> {
    let ok = !record_id.is_empty()
        && record_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(BastionError::InvalidRecordField {
            field: "record_id".to_string(),
            reason: format!("'{}' is not a valid file-safe id", record_id),
        })
    }
}

/// Append-only store of signed records.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date.format(PARTITION_FORMAT).to_string())
    }

    /// Path a record is (or would be) stored at.
    pub fn record_path(&self, record: &AuditRecord) -> BastionResult<PathBuf> {
        validate_record_id(&record.record_id)?;
        let date = partition_date(&record.timestamp)?;
        Ok(self
            .partition_dir(date)
            .join(format!("{}.json", record.record_id)))
    }

    /// Persist `record`.
    ///
    /// Refuses with `SignatureMismatch` if the signature does not match the
    /// record's fields; nothing is written in that case.
    pub fn store(&self, record: &AuditRecord) -> BastionResult<PathBuf> {
        require_valid_signature(record)?;
        let path = self.record_path(record)?;

        let value = serde_json::to_value(record).map_err(|e| BastionError::StorageError {
            reason: format!("failed to encode record '{}': {}", record.record_id, e),
        })?;
        write_atomic(&path, &to_canonical_bytes(&value))?;

        debug!(record_id = %record.record_id, path = %path.display(), "record stored");
        Ok(path)
    }

    /// Load one record by id.
    ///
    /// With `date`, only that partition is consulted; without it every
    /// partition is searched. `Ok(None)` means no such file.
    pub fn load(&self, record_id: &str, date: Option<NaiveDate>) -> BastionResult<Option<AuditRecord>> {
        validate_record_id(record_id)?;
        let file_name = format!("{}.json", record_id);

        let dates = match date {
            Some(d) => vec![d],
            None => self.partitions(None)?,
        };

        for d in dates {
            let path = self.partition_dir(d).join(&file_name);
            if path.is_file() {
                return read_record(&path).map(Some);
            }
        }
        Ok(None)
    }

    /// Partition dates inside the inclusive `range`, ascending.
    pub fn partitions(&self, range: Option<(NaiveDate, NaiveDate)>) -> BastionResult<Vec<NaiveDate>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error("read directory", &self.root, e)),
        };

        let mut dates: Vec<NaiveDate> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name();
                NaiveDate::parse_from_str(name.to_str()?, PARTITION_FORMAT).ok()
            })
            .filter(|date| match range {
                Some((start, end)) => *date >= start && *date <= end,
                None => true,
            })
            .collect();
        dates.sort();
        Ok(dates)
    }

    /// Every readable, correctly signed record in the partitions inside
    /// `range`, partition by partition in ascending date order.
    ///
    /// Unreadable, unparsable or tampered files are skipped with a warning.
    pub fn scan(&self, range: Option<(NaiveDate, NaiveDate)>) -> BastionResult<Vec<AuditRecord>> {
        let mut records = Vec::new();

        for date in self.partitions(range)? {
            let dir = self.partition_dir(date);
            let entries = fs::read_dir(&dir).map_err(|e| storage_error("read directory", &dir, e))?;

            let mut paths: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                .collect();
            paths.sort();

            for path in paths {
                match read_record(&path) {
                    Ok(record) if verify_signature(&record) => records.push(record),
                    Ok(record) => warn!(
                        record_id = %record.record_id,
                        path = %path.display(),
                        "skipping stored record with invalid signature"
                    ),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable record file"),
                }
            }
        }

        Ok(records)
    }
}

fn read_record(path: &Path) -> BastionResult<AuditRecord> {
    let bytes = fs::read(path).map_err(|e| storage_error("read", path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| BastionError::StorageError {
        reason: format!("failed to parse record '{}': {}", path.display(), e),
    })
}
