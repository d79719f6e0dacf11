//! # bastion-audit
//!
//! Tamper-evident Agent State Records for the Bastion security framework.
//!
//! ## Overview
//!
//! Every security event becomes an `AuditRecord` whose signature is the
//! SHA-256 of its canonical JSON. Records are persisted in date partitions
//! and grouped into batches; each sealed batch is summarised by a Merkle
//! root, and any single record can later be proven against that root
//! without revealing the rest of the batch.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bastion_audit::AuditLedger;
//!
//! let ledger = AuditLedger::new(config.ledger.clone());
//! let record = ledger.create_and_store("agent-7", actions::AUTH_FAILURE, 2, PqcStatus::Safe, None)?;
//! if let Some(batch) = ledger.add_to_batch(record)? {
//!     submitter.submit(batch).await?;
//! }
//! ```

pub mod canonical;
pub mod ledger;
pub mod merkle;
pub mod signer;
pub mod store;

pub use canonical::{to_canonical_bytes, to_canonical_string};
pub use ledger::{AuditLedger, BatchState};
pub use merkle::{
    compute_proof, compute_root, leaf_hashes, prove_record, seal_batch, verify_batch,
    verify_inclusion, verify_proof,
};
pub use signer::{compute_signature, require_valid_signature, verify_signature};
pub use store::{write_atomic, RecordStore};

// ── Tests ─────────────────────────────────────────────────────────────────────
