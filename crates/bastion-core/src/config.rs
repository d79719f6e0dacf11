//! Runtime configuration loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid configuration.
//! Values are validated once after parsing; engines can then trust them.
//!
//! Example:
//! ```toml
//! [pqc]
//! backend = "ml-kem"
//! security_level = 768
//!
//! [ledger]
//! storage_root = "./data/asr"
//! max_batch_size = 50
//! batch_timeout_secs = 300
//!
//! [anchor]
//! enabled = true
//! max_retry_attempts = 3
//! retry_base_delay_ms = 2000
//! ```

use std::{path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use bastion_contracts::{
    crypto::SecurityLevel,
    error::{BastionError, BastionResult},
};

/// Which KEM implementation backs the hybrid engine.
///
/// Selected explicitly; there is no runtime probing or silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KemBackend {
    /// Real ML-KEM (FIPS 203).
    #[default]
    MlKem,
    /// Classical stand-in for test environments. Not quantum resistant.
    Simulated,
}

/// `[pqc]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PqcConfig {
    pub backend: KemBackend,
    /// 768 or 1024.
    pub security_level: i64,
}

impl Default for PqcConfig {
    fn default() -> Self {
        Self {
            backend: KemBackend::MlKem,
            security_level: 768,
        }
    }
}

impl PqcConfig {
    pub fn level(&self) -> BastionResult<SecurityLevel> {
        SecurityLevel::from_level(self.security_level)
    }
}

/// `[ledger]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Root of the date-partitioned record store.
    pub storage_root: PathBuf,
    /// Pending records that trigger an automatic seal.
    pub max_batch_size: usize,
    /// Seconds a batch may stay open before it is sealed.
    pub batch_timeout_secs: u64,
    /// Records at or above this threat level are echoed to the log.
    pub min_log_level: u8,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./data/asr"),
            max_batch_size: 50,
            batch_timeout_secs: 300,
            min_log_level: 1,
        }
    }
}

impl LedgerConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

/// `[anchor]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// When false, sealed batches are dropped without submission.
    pub enabled: bool,
    /// Directory holding `<batch_id>.json` cache entries.
    pub cache_root: PathBuf,
    pub max_retry_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub retry_base_delay_ms: u64,
    /// Upper bound on a single submission attempt.
    pub attempt_timeout_secs: u64,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_root: PathBuf::from("./data/asr/blockchain_cache"),
            max_retry_attempts: 3,
            retry_base_delay_ms: 2000,
            attempt_timeout_secs: 30,
        }
    }
}

impl AnchorConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BastionConfig {
    pub pqc: PqcConfig,
    pub ledger: LedgerConfig,
    pub anchor: AnchorConfig,
}

impl BastionConfig {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `BastionError::ConfigError` if the TOML is malformed or a value
    /// is out of range, and `BastionError::UnsupportedSecurityLevel` for a
    /// security level other than 768 or 1024.
    pub fn from_toml_str(s: &str) -> BastionResult<Self> {
        let config: BastionConfig = toml::from_str(s).map_err(|e| BastionError::ConfigError {
            reason: format!("failed to parse config TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML configuration.
    pub fn from_file(path: &Path) -> BastionResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| BastionError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check every cross-field and range constraint.
    pub fn validate(&self) -> BastionResult<()> {
        self.pqc.level()?;

        if self.ledger.max_batch_size == 0 {
            return Err(BastionError::ConfigError {
                reason: "ledger.max_batch_size must be at least 1".to_string(),
            });
        }
        if !(1..=5).contains(&self.ledger.min_log_level) {
            return Err(BastionError::ConfigError {
                reason: format!(
                    "ledger.min_log_level must be between 1 and 5, got {}",
                    self.ledger.min_log_level
                ),
            });
        }
        if self.anchor.max_retry_attempts == 0 {
            return Err(BastionError::ConfigError {
                reason: "anchor.max_retry_attempts must be at least 1".to_string(),
            });
        }
        if self.anchor.attempt_timeout_secs == 0 {
            return Err(BastionError::ConfigError {
                reason: "anchor.attempt_timeout_secs must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}
