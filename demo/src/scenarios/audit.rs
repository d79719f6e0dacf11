//! Scenario 2: Audit Ledger
//!
//! Records five events with `max_batch_size = 5`, so the fifth add seals a
//! batch. Every record is persisted, proven against the batch root, and an
//! out-of-range threat level is refused.

use serde_json::json;

use bastion_audit::{prove_record, verify_inclusion, AuditLedger};
use bastion_contracts::{
    actions,
    error::{BastionError, BastionResult},
    record::{Metadata, PqcStatus, ThreatLevel},
};
use bastion_core::config::{BastionConfig, LedgerConfig};

pub fn run_scenario(config: &BastionConfig) -> BastionResult<()> {
    println!("=== Scenario 2: Audit Ledger ===");
    println!();

    let ledger = AuditLedger::new(LedgerConfig {
        max_batch_size: 5,
        ..config.ledger.clone()
    });
    println!("  Storage root:           {}", ledger.record_store().root().display());

    let events = [
        ("agent-7", actions::AUTH_SUCCESS, 1, "RSA-2048"),
        ("agent-7", actions::KEY_GENERATED, 1, "ML-KEM-768"),
        ("agent-9", actions::AUTH_FAILURE, 2, "HYBRID-ML-KEM-768-AES256GCM"),
        ("agent-9", actions::QUANTUM_RISK_DETECTED, 4, "DES"),
        ("agent-7", actions::ENCRYPT_SUCCESS, 1, "HYBRID-ML-KEM-768-AES256GCM"),
    ];

    let mut sealed = None;
    for (agent, action, threat, cipher) in events {
        let mut metadata = Metadata::new();
        metadata.insert("cipher".into(), json!(cipher));

        let record = ledger.create_and_store(
            agent,
            action,
            threat,
            PqcStatus::assess(cipher, 0),
            Some(metadata),
        )?;
        println!(
            "  {}  {:<22} threat={} pqc={}",
            record.record_id, record.action, record.threat_level, record.pqc_status
        );
        if let Some(batch) = ledger.add_to_batch(record)? {
            sealed = Some(batch);
        }
    }

    let batch = sealed.ok_or_else(|| BastionError::StorageError {
        reason: "fifth record did not seal a batch".to_string(),
    })?;
    println!();
    println!("  Batch id:               {}", batch.batch_id());
    println!("  Merkle root:            {}", batch.merkle_root());
    println!("  Records in batch:       {}", batch.len());
    println!("  Pending after seal:     {}", ledger.pending_count());

    for record in batch.records() {
        let proof = prove_record(&batch, &record.record_id).ok_or_else(|| {
            BastionError::ProofNotFound {
                record_id: record.record_id.clone(),
            }
        })?;
        if !verify_inclusion(&proof) {
            return Err(BastionError::SignatureMismatch {
                record_id: record.record_id.clone(),
            });
        }
    }
    println!("  Inclusion proofs:       {} / {} verified", batch.len(), batch.len());

    let agent_7 = ledger.list_by_agent("agent-7", None, ThreatLevel::INFO)?;
    println!("  Stored for agent-7:     {} record(s)", agent_7.len());

    match ledger.create_record("agent-7", actions::RULE_VIOLATION, 6, PqcStatus::Safe, None) {
        Err(BastionError::InvalidRecordField { field, reason }) => {
            println!("  threat_level=6:         rejected ({}: {})", field, reason);
        }
        Err(e) => return Err(e),
        Ok(_) => {
            return Err(BastionError::StorageError {
                reason: "threat_level=6 was accepted".to_string(),
            })
        }
    }

    println!("  RESULT: SUCCESS (expected)");
    println!();
    Ok(())
}
