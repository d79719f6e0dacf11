//! Anchoring sealed batches on an external ledger.
//!
//! `submit` publishes a batch's Merkle root with bounded retries:
//!
//! ```text
//! attempt 1 ──fail──▶ sleep(base) ──▶ attempt 2 ──fail──▶ sleep(2·base) ──▶ attempt 3 ...
//! ```
//!
//! Each attempt is capped by `attempt_timeout`; a timeout, a client error and
//! a reverted receipt all count as one failed attempt. Anchoring failures are
//! never returned to the caller: an exhausted batch is parked in the cache
//! for `retry_unanchored`, and only local cache I/O errors propagate. A batch
//! that anchors but cannot be cached is parked too, so its records survive.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use bastion_audit::{merkle::decode_hash, prove_record, verify_batch, verify_inclusion};
use bastion_contracts::{
    batch::{AnchorSubmission, Batch, InclusionProof},
    error::{BastionError, BastionResult},
};
use bastion_core::{
    config::AnchorConfig,
    traits::{EventLogger, ExternalLedgerClient, LedgerReceipt},
};

use crate::cache::{BatchCache, CachedBatch};

pub struct AnchorSubmitter {
    client: Arc<dyn ExternalLedgerClient>,
    cache: BatchCache,
    config: AnchorConfig,
    logger: Arc<dyn EventLogger>,
    /// Held for the whole of one submission; tokio's mutex queues waiters
    /// in FIFO order.
    in_flight: Mutex<()>,
}

impl AnchorSubmitter {
    pub fn new(
        client: Arc<dyn ExternalLedgerClient>,
        config: AnchorConfig,
        logger: Arc<dyn EventLogger>,
    ) -> Self {
        let cache = BatchCache::new(config.cache_root.clone());
        Self {
            client,
            cache,
            config,
            logger,
            in_flight: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &BatchCache {
        &self.cache
    }

    // ── Submission ────────────────────────────────────────────────────────────

    /// Anchor `batch`, returning its submission receipt.
    ///
    /// `Ok(None)` when anchoring is disabled (the batch is dropped) or when
    /// every attempt failed (the batch is parked under `unanchored/`).
    pub async fn submit(&self, batch: Batch) -> BastionResult<Option<AnchorSubmission>> {
        if !self.config.enabled {
            debug!(batch_id = %batch.batch_id(), "anchoring disabled; batch dropped");
            return Ok(None);
        }

        let _turn = self.in_flight.lock().await;

        let root = decode_hash(batch.merkle_root()).ok_or_else(|| BastionError::InvalidRecordField {
            field: "merkle_root".to_string(),
            reason: format!("batch '{}' root is not a 64-char hex digest", batch.batch_id()),
        })?;

        match self.submit_with_retry(batch.batch_id(), root).await {
            Some(receipt) => {
                let submission = AnchorSubmission {
                    batch_id: batch.batch_id().to_string(),
                    merkle_root: batch.merkle_root().to_string(),
                    tx_hash: receipt.tx_hash,
                    block_number: receipt.block_number,
                    timestamp: Utc::now(),
                    record_count: batch.len(),
                };
                let created_at = batch.created_at();
                let entry = CachedBatch {
                    submission: submission.clone(),
                    records: batch.into_records(),
                };
                if let Err(e) = self.cache.put(&entry) {
                    let batch = Batch::from_sealed_parts(
                        entry.submission.batch_id,
                        entry.records,
                        entry.submission.merkle_root,
                        created_at,
                    );
                    let parked = self.cache.park(&batch);
                    error!(
                        batch_id = %batch.batch_id(),
                        tx_hash = %submission.tx_hash,
                        error = %e,
                        "anchored batch could not be cached; parking its records"
                    );
                    parked?;
                    return Err(e);
                }

                info!(
                    batch_id = %submission.batch_id,
                    tx_hash = %submission.tx_hash,
                    block_number = submission.block_number,
                    record_count = submission.record_count,
                    "batch anchored"
                );
                self.logger.log_anchor_event(
                    "batch_anchored",
                    &submission.batch_id,
                    true,
                    Some(&submission.tx_hash),
                );
                Ok(Some(submission))
            }
            None => {
                let exhausted = BastionError::AnchorSubmissionExhausted {
                    batch_id: batch.batch_id().to_string(),
                    attempts: self.config.max_retry_attempts,
                };
                let path = self.cache.park(&batch)?;

                error!(
                    batch_id = %batch.batch_id(),
                    parked_at = %path.display(),
                    error = %exhausted,
                    "anchoring abandoned; batch parked"
                );
                self.logger.log_anchor_event(
                    "batch_submit_exhausted",
                    batch.batch_id(),
                    false,
                    Some(&exhausted.to_string()),
                );
                Ok(None)
            }
        }
    }

    async fn submit_with_retry(&self, batch_id: &str, root: [u8; 32]) -> Option<LedgerReceipt> {
        let max_attempts = self.config.max_retry_attempts;
        let attempt_timeout = self.config.attempt_timeout();
        let mut delay = self.config.retry_base_delay();

        for attempt in 1..=max_attempts {
            let cause = match tokio::time::timeout(attempt_timeout, self.client.submit(root)).await {
                Ok(Ok(receipt)) if receipt.success => return Some(receipt),
                Ok(Ok(receipt)) => format!("transaction {} reverted", receipt.tx_hash),
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {:?}", attempt_timeout),
            };

            warn!(
                batch_id = %batch_id,
                attempt,
                max_attempts,
                cause = %cause,
                "anchor attempt failed"
            );
            self.logger.log_anchor_event(
                "batch_submit_failed",
                batch_id,
                false,
                Some(&format!("attempt {}: {}", attempt, cause)),
            );

            if attempt < max_attempts {
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }
        None
    }

    /// Resubmit every parked batch, oldest first.
    ///
    /// Batches that anchor move into the main cache; the rest stay parked.
    /// A parked batch whose records no longer match their signatures or its
    /// root is left in place and not submitted.
    pub async fn retry_unanchored(&self) -> BastionResult<Vec<AnchorSubmission>> {
        let mut anchored = Vec::new();
        for batch in self.cache.parked()? {
            let batch_id = batch.batch_id().to_string();
            if let Err(e) = verify_batch(&batch) {
                warn!(batch_id = %batch_id, error = %e, "parked batch failed verification; not resubmitted");
                continue;
            }
            if let Some(submission) = self.submit(batch).await? {
                self.cache.unpark(&batch_id)?;
                anchored.push(submission);
            }
        }
        Ok(anchored)
    }

    // ── Proofs ────────────────────────────────────────────────────────────────

    /// Regenerate the inclusion proof for `record_id` from the cache.
    ///
    /// `Ok(None)` when no anchored batch contains the record, or when the
    /// cached records no longer reproduce the cached root.
    pub fn get_proof(&self, record_id: &str) -> BastionResult<Option<InclusionProof>> {
        let Some(entry) = self.cache.find_record(record_id)? else {
            return Ok(None);
        };

        let submission = entry.submission;
        let batch = Batch::from_sealed_parts(
            submission.batch_id.clone(),
            entry.records,
            submission.merkle_root.clone(),
            submission.timestamp,
        );

        let proof = prove_record(&batch, record_id).map(|mut proof| {
            proof.anchor_reference = Some(submission.tx_hash.clone());
            proof
        });
        match proof {
            Some(proof) if verify_inclusion(&proof) => Ok(Some(proof)),
            _ => {
                warn!(
                    batch_id = %submission.batch_id,
                    record_id = %record_id,
                    "cached batch does not reproduce its root"
                );
                Ok(None)
            }
        }
    }

    /// Like `get_proof`, but a missing proof is `ProofNotFound`.
    pub fn require_proof(&self, record_id: &str) -> BastionResult<InclusionProof> {
        self.get_proof(record_id)?
            .ok_or_else(|| BastionError::ProofNotFound {
                record_id: record_id.to_string(),
            })
    }

    /// Check `proof` locally and confirm its anchor transaction exists and
    /// succeeded on the external ledger.
    pub async fn verify_on_chain(&self, proof: &InclusionProof) -> bool {
        if !verify_inclusion(proof) {
            return false;
        }
        let Some(tx_hash) = proof.anchor_reference.as_deref() else {
            return false;
        };

        match self.client.get_receipt(tx_hash).await {
            Ok(Some(receipt)) => receipt.success,
            Ok(None) => false,
            Err(e) => {
                warn!(tx_hash = %tx_hash, error = %e, "receipt lookup failed");
                false
            }
        }
    }

    /// Cached submissions whose timestamp falls within `[start, end]`.
    /// Either bound may be open.
    pub fn submissions(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> BastionResult<Vec<AnchorSubmission>> {
        let mut submissions: Vec<AnchorSubmission> = self
            .cache
            .entries()?
            .into_iter()
            .map(|entry| entry.submission)
            .filter(|s| start.map_or(true, |t| s.timestamp >= t))
            .filter(|s| end.map_or(true, |t| s.timestamp <= t))
            .collect();
        submissions.sort_by_key(|s| s.timestamp);
        Ok(submissions)
    }
}
