//! # bastion-anchor
//!
//! Publishes sealed batch roots to an external ledger and serves inclusion
//! proofs for anchored records.
//!
//! This crate provides:
//! - `AnchorSubmitter`: retry with exponential backoff, one submission in
//!   flight at a time, local batch cache, proof regeneration
//! - `AnchorPipeline`: background tokio worker fed by the ledger
//! - `BatchCache`: the on-disk cache format
//! - `InMemoryLedgerClient`: a reference `ExternalLedgerClient`
//!
//! ## Usage
//!
//! ```rust,ignore
//! let submitter = AnchorSubmitter::new(client, config.anchor.clone(), logger);
//! if let Some(submission) = submitter.submit(batch).await? {
//!     let proof = submitter.require_proof(&record_id)?;
//!     assert!(submitter.verify_on_chain(&proof).await);
//! }
//! ```

pub mod cache;
pub mod memory;
pub mod pipeline;
pub mod submitter;

pub use cache::{BatchCache, CachedBatch};
pub use memory::InMemoryLedgerClient;
pub use pipeline::AnchorPipeline;
pub use submitter::AnchorSubmitter;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc, time::Duration};

    use chrono::{DateTime, Utc};

    use bastion_audit::{seal_batch, AuditLedger};
    use bastion_contracts::{
        actions,
        batch::Batch,
        error::BastionError,
        record::PqcStatus,
    };
    use bastion_core::{
        config::{AnchorConfig, LedgerConfig},
        logger::{LoggedEvent, MemoryEventLogger},
    };

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    struct Harness {
        _dir: tempfile::TempDir,
        ledger: Arc<AuditLedger>,
        client: Arc<InMemoryLedgerClient>,
        logger: Arc<MemoryEventLogger>,
        submitter: Arc<AnchorSubmitter>,
    }

    fn harness_with(max_batch_size: usize, tweak: impl FnOnce(&mut AnchorConfig)) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(AuditLedger::new(LedgerConfig {
            storage_root: dir.path().join("asr"),
            max_batch_size,
            batch_timeout_secs: 3600,
            min_log_level: 1,
        }));

        let mut config = AnchorConfig {
            cache_root: dir.path().join("cache"),
            ..AnchorConfig::default()
        };
        tweak(&mut config);

        let client = Arc::new(InMemoryLedgerClient::new());
        let logger = Arc::new(MemoryEventLogger::new());
        let submitter = Arc::new(AnchorSubmitter::new(client.clone(), config, logger.clone()));

        Harness {
            _dir: dir,
            ledger,
            client,
            logger,
            submitter,
        }
    }

    fn harness() -> Harness {
        harness_with(50, |_| {})
    }

    fn batch_of(ledger: &AuditLedger, n: usize) -> Batch {
        let records = (0..n)
            .map(|i| {
                ledger
                    .create_record(&format!("agent-{i}"), actions::TX_SUBMITTED, 1, PqcStatus::Safe, None)
                    .unwrap()
            })
            .collect();
        seal_batch(records).unwrap()
    }

    fn anchor_events(logger: &MemoryEventLogger) -> Vec<(String, bool, Option<String>)> {
        logger
            .events()
            .into_iter()
            .filter_map(|event| match event {
                LoggedEvent::Anchor {
                    event_type,
                    success,
                    detail,
                    ..
                } => Some((event_type, success, detail)),
                LoggedEvent::Crypto { .. } => None,
            })
            .collect()
    }

    // ── Submission ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_submit_caches_and_serves_proofs() {
        let h = harness();
        let batch = batch_of(&h.ledger, 5);
        let expected_root = batch.merkle_root().to_string();
        let record_ids: Vec<String> = batch.records().iter().map(|r| r.record_id.clone()).collect();

        let submission = h.submitter.submit(batch).await.unwrap().unwrap();
        assert_eq!(submission.merkle_root, expected_root);
        assert_eq!(submission.record_count, 5);
        assert_eq!(submission.block_number, 1);
        assert!(h.submitter.cache().get(&submission.batch_id).unwrap().is_some());

        for record_id in &record_ids {
            let proof = h.submitter.require_proof(record_id).unwrap();
            assert_eq!(proof.merkle_root, expected_root);
            assert_eq!(proof.anchor_reference.as_deref(), Some(submission.tx_hash.as_str()));
            assert!(h.submitter.verify_on_chain(&proof).await);
        }

        assert_eq!(
            anchor_events(&h.logger),
            vec![("batch_anchored".to_string(), true, Some(submission.tx_hash.clone()))]
        );
    }

    /// Two failures then success: three attempts, with 2 s and 4 s of
    /// backoff in between.
    #[tokio::test(start_paused = true)]
    async fn test_retry_with_exponential_backoff() {
        let h = harness();
        h.client.fail_next(2);

        let started = tokio::time::Instant::now();
        let submission = h.submitter.submit(batch_of(&h.ledger, 2)).await.unwrap();
        let elapsed = started.elapsed();

        assert!(submission.is_some());
        assert_eq!(h.client.attempts(), 3);
        assert!(elapsed >= Duration::from_secs(6), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(7), "elapsed {:?}", elapsed);

        let events = anchor_events(&h.logger);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].0, "batch_submit_failed");
        assert!(events[0].2.as_deref().unwrap().starts_with("attempt 1:"));
        assert!(events[1].2.as_deref().unwrap().starts_with("attempt 2:"));
        assert_eq!(events[2].0, "batch_anchored");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverted_receipt_counts_as_failure() {
        let h = harness();
        h.client.revert_next(1);

        let submission = h.submitter.submit(batch_of(&h.ledger, 1)).await.unwrap().unwrap();
        assert_eq!(h.client.attempts(), 2);
        assert_eq!(submission.block_number, 2);

        let events = anchor_events(&h.logger);
        assert!(events[0].2.as_deref().unwrap().contains("reverted"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_consumes_an_attempt() {
        let h = harness_with(50, |c| {
            c.max_retry_attempts = 2;
            c.attempt_timeout_secs = 1;
        });
        h.client.set_latency(Some(Duration::from_secs(60)));

        let result = h.submitter.submit(batch_of(&h.ledger, 1)).await.unwrap();
        assert!(result.is_none());
        assert_eq!(h.client.attempts(), 2);

        let events = anchor_events(&h.logger);
        assert!(events[0].2.as_deref().unwrap().contains("timed out"));
    }

    /// Exhaustion parks the batch; a later retry anchors it and makes its
    /// proofs available.
    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_parks_then_retry_anchors() {
        let h = harness();
        h.client.fail_next(3);
        let batch = batch_of(&h.ledger, 3);
        let record_id = batch.records()[1].record_id.clone();

        assert!(h.submitter.submit(batch).await.unwrap().is_none());
        assert_eq!(h.client.attempts(), 3);
        assert_eq!(h.submitter.cache().parked().unwrap().len(), 1);
        assert!(matches!(
            h.submitter.require_proof(&record_id),
            Err(BastionError::ProofNotFound { .. })
        ));

        let events = anchor_events(&h.logger);
        let last = events.last().unwrap();
        assert_eq!(last.0, "batch_submit_exhausted");
        assert!(last.2.as_deref().unwrap().contains("exhausted after 3 attempts"));

        let anchored = h.submitter.retry_unanchored().await.unwrap();
        assert_eq!(anchored.len(), 1);
        assert!(h.submitter.cache().parked().unwrap().is_empty());

        let proof = h.submitter.require_proof(&record_id).unwrap();
        assert!(h.submitter.verify_on_chain(&proof).await);
    }

    #[tokio::test]
    async fn test_disabled_anchoring_drops_batch() {
        let h = harness_with(50, |c| c.enabled = false);
        let batch = batch_of(&h.ledger, 2);

        assert!(h.submitter.submit(batch).await.unwrap().is_none());
        assert_eq!(h.client.attempts(), 0);
        assert!(h.submitter.cache().entries().unwrap().is_empty());
        assert!(h.submitter.cache().parked().unwrap().is_empty());
    }

    /// Concurrent submissions are serialised in arrival order.
    #[tokio::test]
    async fn test_concurrent_submissions_are_serialised() {
        let h = harness();
        let a = batch_of(&h.ledger, 1);
        let b = batch_of(&h.ledger, 2);
        let c = batch_of(&h.ledger, 3);

        let (ra, rb, rc) = tokio::join!(
            h.submitter.submit(a),
            h.submitter.submit(b),
            h.submitter.submit(c)
        );
        let blocks: Vec<u64> = [ra, rb, rc]
            .into_iter()
            .map(|r| r.unwrap().unwrap().block_number)
            .collect();
        assert_eq!(blocks, vec![1, 2, 3]);
        assert_eq!(h.client.anchored_roots().len(), 3);
    }

    // ── Proof verification ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_verify_on_chain_rejects_bad_proofs() {
        let h = harness();
        let batch = batch_of(&h.ledger, 4);
        let record_id = batch.records()[0].record_id.clone();
        h.submitter.submit(batch).await.unwrap();

        let proof = h.submitter.require_proof(&record_id).unwrap();

        let mut wrong_root = proof.clone();
        wrong_root.merkle_root = "00".repeat(32);
        assert!(!h.submitter.verify_on_chain(&wrong_root).await);

        let mut unknown_tx = proof.clone();
        unknown_tx.anchor_reference = Some("0xdeadbeef".into());
        assert!(!h.submitter.verify_on_chain(&unknown_tx).await);

        let mut unanchored = proof;
        unanchored.anchor_reference = None;
        assert!(!h.submitter.verify_on_chain(&unanchored).await);
    }

    #[tokio::test]
    async fn test_tampered_cache_yields_no_proof() {
        let h = harness();
        let batch = batch_of(&h.ledger, 2);
        let record_id = batch.records()[0].record_id.clone();
        let submission = h.submitter.submit(batch).await.unwrap().unwrap();

        let mut entry = h.submitter.cache().get(&submission.batch_id).unwrap().unwrap();
        entry.records[1].signature = "11".repeat(32);
        h.submitter.cache().put(&entry).unwrap();

        assert!(h.submitter.get_proof(&record_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_submissions_time_window() {
        let h = harness();
        let before = Utc::now();
        h.submitter.submit(batch_of(&h.ledger, 1)).await.unwrap();
        h.submitter.submit(batch_of(&h.ledger, 1)).await.unwrap();
        let after = Utc::now();

        assert_eq!(h.submitter.submissions(None, None).unwrap().len(), 2);
        assert_eq!(h.submitter.submissions(Some(before), Some(after)).unwrap().len(), 2);
        assert!(h
            .submitter
            .submissions(Some(after + chrono::Duration::seconds(1)), None)
            .unwrap()
            .is_empty());
        assert!(h
            .submitter
            .submissions(None, Some(before - chrono::Duration::seconds(1)))
            .unwrap()
            .is_empty());
    }

    // ── Pipeline ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_pipeline_anchors_in_order_and_flushes_on_shutdown() {
        let h = harness_with(3, |_| {});
        let pipeline = AnchorPipeline::spawn(
            h.ledger.clone(),
            h.submitter.clone(),
            Duration::from_millis(50),
        );

        for i in 0..7 {
            let record = pipeline
                .ledger()
                .create_record(&format!("agent-{i}"), actions::ACCESS_GRANTED, 1, PqcStatus::Safe, None)
                .unwrap();
            pipeline.record(record).unwrap();
        }

        let submissions = pipeline.shutdown().await.unwrap();
        let counts: Vec<usize> = submissions.iter().map(|s| s.record_count).collect();
        assert_eq!(counts, vec![3, 3, 1]);
        let blocks: Vec<u64> = submissions.iter().map(|s| s.block_number).collect();
        assert_eq!(blocks, vec![1, 2, 3]);
        assert_eq!(h.ledger.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_pipeline_rejects_tampered_record() {
        let h = harness();
        let pipeline = AnchorPipeline::spawn(
            h.ledger.clone(),
            h.submitter.clone(),
            Duration::from_millis(50),
        );

        let mut record = h
            .ledger
            .create_record("agent", actions::AUTH_FAILURE, 2, PqcStatus::Safe, None)
            .unwrap();
        record.agent_id = "someone-else".into();

        assert!(matches!(
            pipeline.record(record),
            Err(BastionError::SignatureMismatch { .. })
        ));
        assert!(pipeline.shutdown().await.unwrap().is_empty());
    }

    /// Ids of batches the submitter gave up on, in the order it did so.
    fn exhausted_batch_ids(logger: &MemoryEventLogger) -> Vec<String> {
        logger
            .events()
            .into_iter()
            .filter_map(|event| match event {
                LoggedEvent::Anchor {
                    event_type,
                    batch_id,
                    ..
                } if event_type == "batch_submit_exhausted" => Some(batch_id),
                _ => None,
            })
            .collect()
    }

    /// Many threads recording at once: every batch is submitted, and in the
    /// order the ledger sealed it. Each attempt fails so every batch ends up
    /// parked with its seal time.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pipeline_submits_in_seal_order_under_concurrency() {
        let h = harness_with(1, |c| c.max_retry_attempts = 1);
        h.client.fail_next(u32::MAX);
        let pipeline = AnchorPipeline::spawn(
            h.ledger.clone(),
            h.submitter.clone(),
            Duration::from_millis(10),
        );

        std::thread::scope(|scope| {
            for t in 0..8 {
                let pipeline = &pipeline;
                scope.spawn(move || {
                    for _ in 0..50 {
                        let record = pipeline
                            .ledger()
                            .create_record(&format!("agent-{t}"), actions::ACCESS_GRANTED, 1, PqcStatus::Safe, None)
                            .unwrap();
                        pipeline.record(record).unwrap();
                    }
                });
            }
        });
        assert!(pipeline.shutdown().await.unwrap().is_empty());

        let submitted = exhausted_batch_ids(&h.logger);
        assert_eq!(submitted.len(), 400);
        assert_eq!(h.client.attempts(), 400);

        let sealed_at: HashMap<String, DateTime<Utc>> = h
            .submitter
            .cache()
            .parked()
            .unwrap()
            .into_iter()
            .map(|b| (b.batch_id().to_string(), b.created_at()))
            .collect();
        assert_eq!(sealed_at.len(), 400);
        let order: Vec<DateTime<Utc>> = submitted.iter().map(|id| sealed_at[id]).collect();
        assert!(order.windows(2).all(|w| w[0] <= w[1]), "submission order differs from seal order");
    }

    /// A batch that only the ticker seals still goes through the queue.
    #[tokio::test]
    async fn test_pipeline_ticker_seals_expired_batch() {
        let h = harness();
        let ledger = Arc::new(AuditLedger::new(LedgerConfig {
            batch_timeout_secs: 1,
            ..h.ledger.config().clone()
        }));
        let pipeline = AnchorPipeline::spawn(ledger.clone(), h.submitter.clone(), Duration::from_millis(50));

        for _ in 0..2 {
            let record = ledger
                .create_record("agent", actions::ACCESS_GRANTED, 1, PqcStatus::Safe, None)
                .unwrap();
            pipeline.record(record).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(1300)).await;
        assert_eq!(ledger.pending_count(), 0);
        assert_eq!(h.client.anchored_roots().len(), 1);

        let submissions = pipeline.shutdown().await.unwrap();
        let counts: Vec<usize> = submissions.iter().map(|s| s.record_count).collect();
        assert_eq!(counts, vec![2]);
    }

    /// Anchored but uncachable: the records are parked instead of lost.
    #[tokio::test]
    async fn test_cache_write_failure_parks_anchored_batch() {
        let h = harness();
        let batch = batch_of(&h.ledger, 3);
        let batch_id = batch.batch_id().to_string();
        let root = batch.merkle_root().to_string();
        let record_id = batch.records()[2].record_id.clone();

        let blocker = h.submitter.cache().root().join(format!("{batch_id}.json"));
        std::fs::create_dir_all(blocker.join("occupied")).unwrap();

        assert!(matches!(
            h.submitter.submit(batch).await,
            Err(BastionError::StorageError { .. })
        ));
        assert_eq!(h.client.anchored_roots().len(), 1);

        let parked = h.submitter.cache().parked().unwrap();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].batch_id(), batch_id);
        assert_eq!(parked[0].merkle_root(), root);
        assert_eq!(parked[0].len(), 3);

        std::fs::remove_dir_all(&blocker).unwrap();
        assert_eq!(h.submitter.retry_unanchored().await.unwrap().len(), 1);
        let proof = h.submitter.require_proof(&record_id).unwrap();
        assert!(h.submitter.verify_on_chain(&proof).await);
    }

    /// Parked files are re-checked before anything is resubmitted.
    #[tokio::test]
    async fn test_retry_skips_forged_parked_batch() {
        let h = harness();
        let genuine = batch_of(&h.ledger, 2);
        let source = batch_of(&h.ledger, 2);
        let forged = Batch::from_sealed_parts(
            source.batch_id().to_string(),
            source.records().to_vec(),
            "ab".repeat(32),
            source.created_at(),
        );
        h.submitter.cache().park(&genuine).unwrap();
        h.submitter.cache().park(&forged).unwrap();

        let anchored = h.submitter.retry_unanchored().await.unwrap();
        assert_eq!(anchored.len(), 1);
        assert_eq!(anchored[0].batch_id, genuine.batch_id());
        assert_eq!(h.client.anchored_roots().len(), 1);

        let still_parked = h.submitter.cache().parked().unwrap();
        assert_eq!(still_parked.len(), 1);
        assert_eq!(still_parked[0].batch_id(), forged.batch_id());
    }
}
