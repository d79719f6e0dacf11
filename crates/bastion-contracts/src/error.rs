//! Error types for the Bastion crypto and audit pipeline.
//!
//! All fallible operations return `BastionResult<T>`. Crypto and signature
//! errors propagate straight to the caller; anchoring failures are absorbed
//! by the submitter and only surface through logs.

use thiserror::Error;

/// The unified error type for Bastion.
#[derive(Debug, Error)]
pub enum BastionError {
    /// The requested ML-KEM parameter set is not 768 or 1024.
    ///
    /// Rejected before any cryptographic work is attempted.
    #[error("unsupported security level {level}: must be 768 or 1024")]
    UnsupportedSecurityLevel { level: i64 },

    /// Hybrid decryption failed.
    ///
    /// Deliberately carries no detail: a KEM decapsulation error and an AEAD
    /// tag mismatch are indistinguishable to the caller.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Wire-format framing of a hybrid ciphertext is inconsistent.
    #[error("malformed ciphertext: {reason}")]
    MalformedCiphertext { reason: String },

    /// A record field violated its domain (threat level, PQC status, signature shape).
    #[error("invalid record field '{field}': {reason}")]
    InvalidRecordField { field: String, reason: String },

    /// A record's stored signature does not match its fields.
    ///
    /// Only produced by programming errors or tampering. The operation that
    /// hit it is aborted; the record is never re-signed.
    #[error("signature mismatch for record '{record_id}'")]
    SignatureMismatch { record_id: String },

    /// Every anchoring attempt for a batch failed.
    #[error("anchor submission for batch '{batch_id}' exhausted after {attempts} attempts")]
    AnchorSubmissionExhausted { batch_id: String, attempts: u32 },

    /// The record is not part of any cached, anchored batch.
    #[error("no inclusion proof found for record '{record_id}'")]
    ProofNotFound { record_id: String },

    /// The KEM provider rejected a key or failed to encapsulate.
    #[error("key encapsulation failed: {reason}")]
    KemFailure { reason: String },

    /// Symmetric encryption or key derivation failed on the encrypt path.
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// Reading or writing the record store or batch cache failed.
    #[error("storage error: {reason}")]
    StorageError { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

/// Convenience alias used throughout the Bastion crates.
pub type BastionResult<T> = Result<T, BastionError>;
