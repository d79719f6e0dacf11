//! Agent State Record types.
//!
//! An `AuditRecord` is one signed security event. Its `signature` is the
//! SHA-256 of the canonical JSON of every other field, so any mutation after
//! signing is detectable. Signing and verification live in `bastion-audit`;
//! this module only defines the data and its domain constraints.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{BastionError, BastionResult};

/// Schema version stamped into every record.
pub const RECORD_VERSION: &str = "1.0";

/// Free-form event metadata. `BTreeMap` keeps key order stable in memory;
/// the canonical encoder sorts nested objects independently.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Severity of a recorded event, constrained to 1..=5.
///
/// Construction and deserialization both reject out-of-range values; there
/// is no clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct ThreatLevel(u8);

impl ThreatLevel {
    /// Routine operations (key rotation, normal activity).
    pub const INFO: ThreatLevel = ThreatLevel(1);
    /// Minor issues such as a failed auth attempt.
    pub const CAUTION: ThreatLevel = ThreatLevel(2);
    /// Moderate concern, e.g. a quantum-vulnerable cipher in use.
    pub const WARNING: ThreatLevel = ThreatLevel(3);
    /// Significant concern, e.g. a potential breach pattern.
    pub const ALERT: ThreatLevel = ThreatLevel(4);
    /// Immediate action required.
    pub const CRITICAL: ThreatLevel = ThreatLevel(5);

    /// Validate `level` and wrap it.
    ///
    /// Returns `BastionError::InvalidRecordField` unless `1 <= level <= 5`.
    pub fn new(level: i64) -> BastionResult<Self> {
        if (1..=5).contains(&level) {
            Ok(Self(level as u8))
        } else {
            Err(BastionError::InvalidRecordField {
                field: "threat_level".to_string(),
                reason: format!("must be between 1 and 5, got {}", level),
            })
        }
    }

    /// The numeric level.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for ThreatLevel {
    type Error = BastionError;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<ThreatLevel> for u8 {
    fn from(level: ThreatLevel) -> Self {
        level.0
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Post-quantum posture attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PqcStatus {
    Safe,
    Warning,
    Critical,
}

impl PqcStatus {
    /// The lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            PqcStatus::Safe => "safe",
            PqcStatus::Warning => "warning",
            PqcStatus::Critical => "critical",
        }
    }

    /// Classify an algorithm identifier by quantum safety.
    ///
    /// ML-KEM and hybrid schemes are `Safe` until their key is older than a
    /// year, classical schemes (AES, ECDSA, RSA) are `Warning`, and anything
    /// unrecognised is `Critical`. Matching is case-insensitive substring.
    pub fn assess(algorithm: &str, key_age_days: u32) -> Self {
        let upper = algorithm.to_uppercase();

        let quantum_safe = ["ML-KEM-768", "ML-KEM-1024", "HYBRID"];
        if quantum_safe.iter().any(|name| upper.contains(name)) {
            return if key_age_days > 365 {
                PqcStatus::Warning
            } else {
                PqcStatus::Safe
            };
        }

        let classical = ["AES", "ECDSA", "RSA"];
        if classical.iter().any(|name| upper.contains(name)) {
            return PqcStatus::Warning;
        }

        PqcStatus::Critical
    }
}

impl FromStr for PqcStatus {
    type Err = BastionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "safe" => Ok(PqcStatus::Safe),
            "warning" => Ok(PqcStatus::Warning),
            "critical" => Ok(PqcStatus::Critical),
            other => Err(BastionError::InvalidRecordField {
                field: "pqc_status".to_string(),
                reason: format!("expected one of safe, warning, critical; got '{}'", other),
            }),
        }
    }
}

impl fmt::Display for PqcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, signed Agent State Record.
///
/// Produced by `AuditLedger::create_record()`. Records are never updated in
/// place: changing any field makes `signature` stale, which
/// `RecordSigner::verify` detects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique id, `rec_` followed by 32 hex chars.
    pub record_id: String,

    /// RFC 3339 creation time in UTC. Its date is the storage partition.
    pub timestamp: String,

    /// The agent or user that triggered the event.
    pub agent_id: String,

    /// What happened (see [`crate::actions`] for the canonical names).
    pub action: String,

    /// Severity, 1..=5.
    pub threat_level: ThreatLevel,

    /// Post-quantum posture at the time of the event.
    pub pqc_status: PqcStatus,

    /// Lowercase hex SHA-256 over the canonical encoding of all other fields.
    pub signature: String,

    /// Event-specific data.
    #[serde(default)]
    pub metadata: Metadata,

    /// Record schema version.
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    RECORD_VERSION.to_string()
}
