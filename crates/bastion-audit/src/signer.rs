//! Record signing: SHA-256 over the canonical encoding of a record.
//!
//! Signed fields (all of them except `signature` itself):
//!   action, agent_id, metadata, pqc_status, record_id, threat_level,
//!   timestamp, version
//!
//! The signature is an integrity checksum, not an authentication tag: anyone
//! can recompute it. Authenticity comes from anchoring the batch root.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use bastion_contracts::{
    error::{BastionError, BastionResult},
    record::{AuditRecord, Metadata, PqcStatus, ThreatLevel, RECORD_VERSION},
};

use crate::canonical::to_canonical_bytes;

/// The JSON object whose canonical encoding is hashed.
pub fn signing_payload(record: &AuditRecord) -> Value {
    let metadata: Map<String, Value> = record
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut payload = Map::new();
    payload.insert("action".into(), Value::String(record.action.clone()));
    payload.insert("agent_id".into(), Value::String(record.agent_id.clone()));
    payload.insert("metadata".into(), Value::Object(metadata));
    payload.insert("pqc_status".into(), Value::String(record.pqc_status.to_string()));
    payload.insert("record_id".into(), Value::String(record.record_id.clone()));
    payload.insert("threat_level".into(), Value::from(record.threat_level.value()));
    payload.insert("timestamp".into(), Value::String(record.timestamp.clone()));
    payload.insert("version".into(), Value::String(record.version.clone()));
    Value::Object(payload)
}

/// Lowercase hex SHA-256 of the record's canonical signing payload.
pub fn compute_signature(record: &AuditRecord) -> String {
    let digest = Sha256::digest(to_canonical_bytes(&signing_payload(record)));
    hex::encode(digest)
}

/// Whether `record.signature` matches its fields.
///
/// The comparison runs in constant time over the hex strings.
pub fn verify_signature(record: &AuditRecord) -> bool {
    let expected = compute_signature(record);
    expected.as_bytes().ct_eq(record.signature.as_bytes()).into()
}

/// Like `verify_signature`, but as a `SignatureMismatch` error.
pub fn require_valid_signature(record: &AuditRecord) -> BastionResult<()> {
    if verify_signature(record) {
        Ok(())
    } else {
        Err(BastionError::SignatureMismatch {
            record_id: record.record_id.clone(),
        })
    }
}

/// Build and sign a new record stamped with a fresh id and the current time.
///
/// Fails with `InvalidRecordField` when `threat_level` is outside 1..=5.
pub fn new_signed_record(
    agent_id: &str,
    action: &str,
    threat_level: i64,
    pqc_status: PqcStatus,
    metadata: Option<Metadata>,
) -> BastionResult<AuditRecord> {
    let threat_level = ThreatLevel::new(threat_level)?;

    let mut record = AuditRecord {
        record_id: format!("rec_{}", uuid::Uuid::new_v4().simple()),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        agent_id: agent_id.to_string(),
        action: action.to_string(),
        threat_level,
        pqc_status,
        signature: String::new(),
        metadata: metadata.unwrap_or_default(),
        version: RECORD_VERSION.to_string(),
    };
    record.signature = compute_signature(&record);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fixed_record() -> AuditRecord {
        let mut metadata = Metadata::new();
        metadata.insert("ip".into(), json!("10.0.0.7"));
        metadata.insert("attempts".into(), json!(3));

        let mut record = AuditRecord {
            record_id: "rec_0001".into(),
            timestamp: "2026-01-15T12:00:00.000000Z".into(),
            agent_id: "agent-7".into(),
            action: "auth_failure".into(),
            threat_level: ThreatLevel::CAUTION,
            pqc_status: PqcStatus::Warning,
            signature: String::new(),
            metadata,
            version: "1.0".into(),
        };
        record.signature = compute_signature(&record);
        record
    }

    #[test]
    fn payload_encoding_is_stable() {
        let record = fixed_record();
        let encoded = String::from_utf8(to_canonical_bytes(&signing_payload(&record))).unwrap();
        assert_eq!(
            encoded,
            concat!(
                r#"{"action":"auth_failure","agent_id":"agent-7","#,
                r#""metadata":{"attempts":3,"ip":"10.0.0.7"},"pqc_status":"warning","#,
                r#""record_id":"rec_0001","threat_level":2,"#,
                r#""timestamp":"2026-01-15T12:00:00.000000Z","version":"1.0"}"#
            )
        );
    }

    #[test]
    fn signature_is_64_lowercase_hex() {
        let record = fixed_record();
        assert_eq!(record.signature.len(), 64);
        assert!(record
            .signature
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert!(verify_signature(&record));
    }

    #[test]
    fn any_field_change_breaks_signature() {
        let base = fixed_record();

        let mutations: Vec<Box<dyn Fn(&mut AuditRecord)>> = vec![
            Box::new(|r| r.record_id.push('x')),
            Box::new(|r| r.timestamp = "2026-01-15T12:00:01.000000Z".into()),
            Box::new(|r| r.agent_id = "agent-8".into()),
            Box::new(|r| r.action = "auth_success".into()),
            Box::new(|r| r.threat_level = ThreatLevel::CRITICAL),
            Box::new(|r| r.pqc_status = PqcStatus::Safe),
            Box::new(|r| {
                r.metadata.insert("ip".into(), json!("10.0.0.8"));
            }),
            Box::new(|r| r.version = "1.1".into()),
            Box::new(|r| r.signature = "0".repeat(64)),
        ];

        for mutate in mutations {
            let mut record = base.clone();
            mutate(&mut record);
            assert!(!verify_signature(&record));
            assert!(matches!(
                require_valid_signature(&record),
                Err(BastionError::SignatureMismatch { .. })
            ));
        }
    }

    #[test]
    fn new_record_is_signed() {
        let record = new_signed_record("agent-1", "key_generated", 1, PqcStatus::Safe, None).unwrap();
        assert!(record.record_id.starts_with("rec_"));
        assert_eq!(record.record_id.len(), 4 + 32);
        assert_eq!(record.version, RECORD_VERSION);
        assert!(record.metadata.is_empty());
        assert!(verify_signature(&record));
    }

    #[test]
    fn out_of_range_threat_level_rejected() {
        for level in [0, 6, -1] {
            assert!(matches!(
                new_signed_record("a", "b", level, PqcStatus::Safe, None),
                Err(BastionError::InvalidRecordField { ref field, .. }) if field == "threat_level"
            ));
        }
    }
}
