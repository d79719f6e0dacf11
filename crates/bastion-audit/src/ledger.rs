//! The audit ledger: record creation, persistence, and pending-batch state.
//!
//! ```text
//!   Empty ──add──▶ Accumulating ──size / timeout / flush──▶ sealed Batch
//!     ▲                                                         │
//!     └────────────────────── pending cleared ◀─────────────────┘
//! ```
//!
//! The pending list lives behind a `Mutex`; sealing happens inside the same
//! critical section as the append that triggered it, so no record can slip
//! in between the root computation and the reset.

use std::{
    path::PathBuf,
    sync::{Mutex, PoisonError},
    time::Instant,
};

use chrono::NaiveDate;
use tracing::{debug, info};

use bastion_contracts::{
    batch::Batch,
    error::{BastionError, BastionResult},
    record::{AuditRecord, Metadata, PqcStatus, ThreatLevel},
};
use bastion_core::config::LedgerConfig;

use crate::{
    merkle::{leaf_hashes, seal_batch},
    signer::{new_signed_record, require_valid_signature},
    store::RecordStore,
};

/// Observable state of the current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// No pending records.
    Empty,
    /// At least one record waiting to be sealed.
    Accumulating,
}

// ── Internal mutable state ────────────────────────────────────────────────────

#[derive(Default)]
struct PendingBatch {
    records: Vec<AuditRecord>,
    /// When the first pending record arrived.
    opened_at: Option<Instant>,
}

impl PendingBatch {
    fn expired(&self, timeout: std::time::Duration) -> bool {
        self.opened_at.is_some_and(|opened| opened.elapsed() >= timeout)
    }

    /// Seal everything pending into a batch and reset to empty.
    fn seal(&mut self) -> BastionResult<Option<Batch>> {
        if self.records.is_empty() {
            return Ok(None);
        }
        // Validate leaves before taking the records so a failure loses nothing.
        leaf_hashes(&self.records)?;

        let batch = seal_batch(std::mem::take(&mut self.records))?;
        self.opened_at = None;

        info!(
            batch_id = %batch.batch_id(),
            record_count = batch.len(),
            merkle_root = %batch.merkle_root(),
            "batch sealed"
        );
        Ok(Some(batch))
    }
}

// ── Ledger ────────────────────────────────────────────────────────────────────

pub struct AuditLedger {
    config: LedgerConfig,
    store: RecordStore,
    pending: Mutex<PendingBatch>,
}

impl AuditLedger {
    /// Create a ledger persisting under `config.storage_root`.
    pub fn new(config: LedgerConfig) -> Self {
        let store = RecordStore::new(config.storage_root.clone());
        Self {
            config,
            store,
            pending: Mutex::new(PendingBatch::default()),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn record_store(&self) -> &RecordStore {
        &self.store
    }

    fn lock_pending(&self) -> BastionResult<std::sync::MutexGuard<'_, PendingBatch>> {
        self.pending.lock().map_err(|e| BastionError::StorageError {
            reason: format!("ledger state lock poisoned: {}", e),
        })
    }

    // ── Records ───────────────────────────────────────────────────────────────

    /// Create and sign a record. Does not store it or add it to a batch.
    pub fn create_record(
        &self,
        agent_id: &str,
        action: &str,
        threat_level: i64,
        pqc_status: PqcStatus,
        metadata: Option<Metadata>,
    ) -> BastionResult<AuditRecord> {
        let record = new_signed_record(agent_id, action, threat_level, pqc_status, metadata)?;

        if record.threat_level.value() >= self.config.min_log_level {
            info!(
                record_id = %record.record_id,
                agent_id = %record.agent_id,
                action = %record.action,
                threat_level = record.threat_level.value(),
                pqc_status = %record.pqc_status,
                "asr_created"
            );
        } else {
            debug!(record_id = %record.record_id, "asr_created");
        }
        Ok(record)
    }

    /// Persist `record` in its date partition after verifying its signature.
    pub fn store(&self, record: &AuditRecord) -> BastionResult<PathBuf> {
        self.store.store(record)
    }

    /// `create_record` followed by `store`; nothing is returned unless both
    /// succeed.
    pub fn create_and_store(
        &self,
        agent_id: &str,
        action: &str,
        threat_level: i64,
        pqc_status: PqcStatus,
        metadata: Option<Metadata>,
    ) -> BastionResult<AuditRecord> {
        let record = self.create_record(agent_id, action, threat_level, pqc_status, metadata)?;
        self.store(&record)?;
        Ok(record)
    }

    pub fn load(&self, record_id: &str, date: Option<NaiveDate>) -> BastionResult<Option<AuditRecord>> {
        self.store.load(record_id, date)
    }

    /// Stored records for `agent_id` at or above `min_threat_level`.
    ///
    /// Ordered by partition date only; order within a day is unspecified.
    pub fn list_by_agent(
        &self,
        agent_id: &str,
        date_range: Option<(NaiveDate, NaiveDate)>,
        min_threat_level: ThreatLevel,
    ) -> BastionResult<Vec<AuditRecord>> {
        Ok(self
            .store
            .scan(date_range)?
            .into_iter()
            .filter(|r| r.agent_id == agent_id && r.threat_level >= min_threat_level)
            .collect())
    }

    // ── Batching ──────────────────────────────────────────────────────────────

    /// Append `record` to the pending batch.
    ///
    /// Returns the sealed batch when this append reached `max_batch_size` or
    /// the batch had been open for `batch_timeout`. Rejects records whose
    /// signature does not match with `SignatureMismatch`.
    pub fn add_to_batch(&self, record: AuditRecord) -> BastionResult<Option<Batch>> {
        self.add_to_batch_with(record, Ok)
    }

    /// Like `add_to_batch`, but a sealed batch is handed to `on_seal` before
    /// the pending lock is released. Concurrent callers therefore see their
    /// batches in the order they were sealed.
    pub fn add_to_batch_with<T>(
        &self,
        record: AuditRecord,
        on_seal: impl FnOnce(Batch) -> BastionResult<T>,
    ) -> BastionResult<Option<T>> {
        require_valid_signature(&record)?;

        let mut pending = self.lock_pending()?;
        if pending.opened_at.is_none() {
            pending.opened_at = Some(Instant::now());
        }
        debug!(record_id = %record.record_id, pending = pending.records.len() + 1, "record batched");
        pending.records.push(record);

        if pending.records.len() >= self.config.max_batch_size
            || pending.expired(self.config.batch_timeout())
        {
            return pending.seal()?.map(on_seal).transpose();
        }
        Ok(None)
    }

    /// Seal whatever is pending. `Ok(None)` when there is nothing to seal.
    pub fn flush(&self) -> BastionResult<Option<Batch>> {
        self.flush_with(Ok)
    }

    /// `flush`, handing the sealed batch to `on_seal` under the pending lock.
    pub fn flush_with<T>(
        &self,
        on_seal: impl FnOnce(Batch) -> BastionResult<T>,
    ) -> BastionResult<Option<T>> {
        let mut pending = self.lock_pending()?;
        pending.seal()?.map(on_seal).transpose()
    }

    /// Seal the pending batch only if it has been open for `batch_timeout`.
    pub fn flush_if_expired(&self) -> BastionResult<Option<Batch>> {
        self.flush_if_expired_with(Ok)
    }

    /// `flush_if_expired`, handing the sealed batch to `on_seal` under the
    /// pending lock.
    pub fn flush_if_expired_with<T>(
        &self,
        on_seal: impl FnOnce(Batch) -> BastionResult<T>,
    ) -> BastionResult<Option<T>> {
        let mut pending = self.lock_pending()?;
        if pending.expired(self.config.batch_timeout()) {
            return pending.seal()?.map(on_seal).transpose();
        }
        Ok(None)
    }

    /// Records waiting in the pending batch. A poisoned lock still reports
    /// what it holds.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    pub fn state(&self) -> BatchState {
        if self.pending_count() == 0 {
            BatchState::Empty
        } else {
            BatchState::Accumulating
        }
    }
}
