//! # bastion-core
//!
//! Collaborator traits, security event logging, and configuration shared by
//! the Bastion engines.
//!
//! This crate provides:
//! - The three collaborator traits (`KeyEncapsulationProvider`,
//!   `ExternalLedgerClient`, `EventLogger`)
//! - `TracingEventLogger` and `MemoryEventLogger`
//! - `BastionConfig`, loaded from TOML
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bastion_core::{config::BastionConfig, logger::TracingEventLogger};
//!
//! let config = BastionConfig::from_file(Path::new("bastion.toml"))?;
//! let logger = Arc::new(TracingEventLogger::new());
//! ```

pub mod config;
pub mod logger;
pub mod traits;

pub use config::{AnchorConfig, BastionConfig, KemBackend, LedgerConfig, PqcConfig};
pub use logger::{LoggedEvent, MemoryEventLogger, TracingEventLogger};
pub use traits::{EventLogger, ExternalLedgerClient, KeyEncapsulationProvider, LedgerReceipt};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bastion_contracts::{crypto::SecurityLevel, error::BastionError};

    use super::*;

    // ── Config parsing ────────────────────────────────────────────────────────

    /// An empty document yields the documented defaults.
    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BastionConfig::from_toml_str("").unwrap();

        assert_eq!(config.pqc.backend, KemBackend::MlKem);
        assert_eq!(config.pqc.level().unwrap(), SecurityLevel::MlKem768);
        assert_eq!(config.ledger.max_batch_size, 50);
        assert_eq!(config.ledger.batch_timeout(), Duration::from_secs(300));
        assert!(config.anchor.enabled);
        assert_eq!(config.anchor.max_retry_attempts, 3);
        assert_eq!(config.anchor.retry_base_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_full_config_round_trip() {
        let toml = r#"
            [pqc]
            backend = "simulated"
            security_level = 1024

            [ledger]
            storage_root = "/var/lib/bastion/asr"
            max_batch_size = 5
            batch_timeout_secs = 10
            min_log_level = 3

            [anchor]
            enabled = false
            cache_root = "/var/lib/bastion/cache"
            max_retry_attempts = 5
            retry_base_delay_ms = 250
            attempt_timeout_secs = 4
        "#;

        let config = BastionConfig::from_toml_str(toml).unwrap();

        assert_eq!(config.pqc.backend, KemBackend::Simulated);
        assert_eq!(config.pqc.level().unwrap(), SecurityLevel::MlKem1024);
        assert_eq!(config.ledger.storage_root.to_str(), Some("/var/lib/bastion/asr"));
        assert_eq!(config.ledger.max_batch_size, 5);
        assert_eq!(config.ledger.min_log_level, 3);
        assert!(!config.anchor.enabled);
        assert_eq!(config.anchor.retry_base_delay(), Duration::from_millis(250));
        assert_eq!(config.anchor.attempt_timeout(), Duration::from_secs(4));
    }

    #[test]
    fn test_unsupported_security_level_rejected() {
        let toml = r#"
            [pqc]
            security_level = 512
        "#;

        match BastionConfig::from_toml_str(toml) {
            Err(BastionError::UnsupportedSecurityLevel { level }) => assert_eq!(level, 512),
            other => panic!("expected UnsupportedSecurityLevel, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let toml = r#"
            [ledger]
            max_batch_size = 0
        "#;

        match BastionConfig::from_toml_str(toml) {
            Err(BastionError::ConfigError { reason }) => {
                assert!(reason.contains("max_batch_size"), "unexpected reason: {reason}");
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_retry_attempts_rejected() {
        let toml = r#"
            [anchor]
            max_retry_attempts = 0
        "#;

        assert!(matches!(
            BastionConfig::from_toml_str(toml),
            Err(BastionError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let toml = r#"
            [pqc]
            backend = "liboqs"
        "#;

        match BastionConfig::from_toml_str(toml) {
            Err(BastionError::ConfigError { reason }) => {
                assert!(reason.contains("failed to parse config TOML"));
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = BastionConfig::from_file(std::path::Path::new("/nonexistent/bastion.toml"));
        assert!(matches!(result, Err(BastionError::ConfigError { .. })));
    }

    // ── MemoryEventLogger ─────────────────────────────────────────────────────

    #[test]
    fn test_memory_logger_records_in_order() {
        let logger = MemoryEventLogger::new();
        logger.log_crypto_operation("keygen", "ML-KEM-768", true, Some(Duration::from_millis(3)));
        logger.log_anchor_event("batch_submit_failed", "batch_1", false, Some("attempt 1: timeout"));

        let events = logger.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            LoggedEvent::Crypto { operation, success: true, .. } if operation == "keygen"
        ));
        assert!(matches!(
            &events[1],
            LoggedEvent::Anchor { batch_id, success: false, detail: Some(d), .. }
                if batch_id == "batch_1" && d.contains("attempt 1")
        ));
    }

    /// The tracing logger must accept events with no subscriber installed.
    #[test]
    fn test_tracing_logger_is_infallible() {
        let logger = TracingEventLogger::new();
        logger.log_crypto_operation("hybrid_decrypt", "HYBRID-ML-KEM-768-AES256GCM", false, None);
        logger.log_anchor_event("batch_submitted", "batch_2", true, None);
    }
}
