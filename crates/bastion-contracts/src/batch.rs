//! Batch, inclusion-proof, and anchoring types.
//!
//! A `Batch` is a sealed, ordered group of records summarised by one Merkle
//! root. An `InclusionProof` shows a single record belongs to that root. An
//! `AnchorSubmission` is the receipt for publishing the root externally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::AuditRecord;

/// A raw 32-byte SHA-256 digest.
pub type Hash32 = [u8; 32];

/// A sealed batch of records.
///
/// Fields are private: a batch is either produced by sealing a record list
/// (which computes `merkle_root`) or rehydrated from the batch cache. There
/// is no way to append to a batch once it exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    batch_id: String,
    records: Vec<AuditRecord>,
    merkle_root: String,
    created_at: DateTime<Utc>,
}

impl Batch {
    /// Generate a fresh batch id: `batch_` followed by 32 hex chars.
    pub fn new_id() -> String {
        format!("batch_{}", uuid::Uuid::new_v4().simple())
    }

    /// Assemble a batch whose root has already been computed over `records`
    /// in the given order.
    pub fn from_sealed_parts(
        batch_id: String,
        records: Vec<AuditRecord>,
        merkle_root: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            batch_id,
            records,
            merkle_root,
            created_at,
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    /// Records in leaf order.
    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    /// Lowercase hex Merkle root.
    pub fn merkle_root(&self) -> &str {
        &self.merkle_root
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the batch, returning its records in leaf order.
    pub fn into_records(self) -> Vec<AuditRecord> {
        self.records
    }
}

/// Where a proof step's sibling sits relative to the running hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Sibling is on the left: `parent = H(sibling || current)`.
    Left,
    /// Sibling is on the right: `parent = H(current || sibling)`.
    Right,
}

/// One level of a Merkle inclusion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    #[serde(with = "hex::serde")]
    pub sibling: Hash32,
    pub side: Side,
}

/// Proof that one record is a leaf of a batch's Merkle tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// The record being proven.
    pub record_id: String,

    /// Hex signature of the record: the leaf hash.
    pub record_signature: String,

    /// Sibling path from leaf to root, bottom level first.
    pub path: Vec<ProofStep>,

    /// Hex root the path must reproduce.
    pub merkle_root: String,

    /// Batch the record was sealed into.
    pub batch_id: String,

    /// External transaction that anchored `merkle_root`, when known.
    pub anchor_reference: Option<String>,
}

/// Receipt for a batch root recorded on the external ledger.
///
/// Created exactly once per anchored batch and cached keyed by `batch_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorSubmission {
    pub batch_id: String,
    pub merkle_root: String,
    pub tx_hash: String,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    pub record_count: usize,
}
