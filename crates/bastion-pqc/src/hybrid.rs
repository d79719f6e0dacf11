//! Hybrid encryption: KEM-encapsulated secret, HKDF-SHA256 key derivation,
//! AES-256-GCM payload encryption.
//!
//! ```text
//! encapsulate(pk) -> (kem_ct, ss)
//! key   = HKDF-SHA256(salt = 0^32, ikm = ss, info = HKDF_INFO, len = 32)
//! nonce = random 12 bytes
//! aead  = AES-256-GCM(key, nonce, plaintext, aad)
//! ```
//!
//! Every decryption failure surfaces as the same `DecryptionFailed` error so
//! that callers cannot tell a bad key from a bad tag.

use std::{sync::Arc, time::Instant};

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use bastion_contracts::{
    crypto::{HybridCiphertext, KeyPair, SecurityLevel, SharedSecret, NONCE_LEN},
    error::{BastionError, BastionResult},
};
use bastion_core::{
    config::{KemBackend, PqcConfig},
    traits::{EventLogger, KeyEncapsulationProvider},
};

use crate::kem::SimulatedKemProvider;

/// HKDF `info` label binding derived keys to this construction.
pub const HKDF_INFO: &[u8] = b"BASTION-HYBRID-v1";

const HKDF_SALT: [u8; 32] = [0u8; 32];

/// Hybrid KEM + AEAD engine.
pub struct HybridEncryptionEngine {
    provider: Arc<dyn KeyEncapsulationProvider>,
    logger: Arc<dyn EventLogger>,
    default_level: SecurityLevel,
}

impl HybridEncryptionEngine {
    pub fn new(provider: Arc<dyn KeyEncapsulationProvider>, logger: Arc<dyn EventLogger>) -> Self {
        Self {
            provider,
            logger,
            default_level: SecurityLevel::MlKem768,
        }
    }

    /// Build an engine for the backend and level named in `config`.
    ///
    /// Requesting `ml-kem` from a build without the `ml-kem` feature is a
    /// `ConfigError`; there is no silent fallback to the simulated backend.
    pub fn from_config(config: &PqcConfig, logger: Arc<dyn EventLogger>) -> BastionResult<Self> {
        let level = config.level()?;
        let provider: Arc<dyn KeyEncapsulationProvider> = match config.backend {
            KemBackend::MlKem => ml_kem_provider()?,
            KemBackend::Simulated => Arc::new(SimulatedKemProvider::new()),
        };

        let mut engine = Self::new(provider, logger);
        engine.default_level = level;
        Ok(engine)
    }

    pub fn default_level(&self) -> SecurityLevel {
        self.default_level
    }

    /// Hybrid algorithm identifier for `level`,
    /// e.g. `HYBRID-ML-KEM-768-AES256GCM`.
    pub fn algorithm(&self, level: SecurityLevel) -> String {
        format!("HYBRID-{}-AES256GCM", self.provider.algorithm(level))
    }

    /// Generate a key pair at `security_level` (768 or 1024).
    ///
    /// An unsupported level is rejected before any key material is produced.
    pub fn generate_keypair(&self, security_level: i64) -> BastionResult<KeyPair> {
        let level = SecurityLevel::from_level(security_level)?;
        let kem_algorithm = self.provider.algorithm(level);
        let started = Instant::now();

        let result = self.provider.generate_keypair(level);
        self.logger
            .log_crypto_operation("keygen", &kem_algorithm, result.is_ok(), Some(started.elapsed()));

        let (public_key, secret_key) = result?;
        let keypair = KeyPair::new(public_key, secret_key, kem_algorithm);
        debug!(
            key_id = %keypair.key_id,
            fingerprint = %keypair.public_key_fingerprint(),
            algorithm = %keypair.algorithm,
            "generated key pair"
        );
        Ok(keypair)
    }

    /// Generate a key pair at the configured default level.
    pub fn generate_default_keypair(&self) -> BastionResult<KeyPair> {
        self.generate_keypair(i64::from(self.default_level.level()))
    }

    /// Encrypt `plaintext` to the holder of `recipient_public_key`.
    ///
    /// The parameter set is inferred from the public key's length; a key of
    /// any other length is a `KemFailure`.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        recipient_public_key: &[u8],
        aad: Option<&[u8]>,
    ) -> BastionResult<HybridCiphertext> {
        let started = Instant::now();
        let result = self.encrypt_inner(plaintext, recipient_public_key, aad);

        let algorithm = match &result {
            Ok(ciphertext) => ciphertext.algorithm.clone(),
            Err(_) => "HYBRID-AES256GCM".to_string(),
        };
        self.logger.log_crypto_operation(
            "hybrid_encrypt",
            &algorithm,
            result.is_ok(),
            Some(started.elapsed()),
        );
        result
    }

    fn encrypt_inner(
        &self,
        plaintext: &[u8],
        recipient_public_key: &[u8],
        aad: Option<&[u8]>,
    ) -> BastionResult<HybridCiphertext> {
        let level = SecurityLevel::from_public_key_len(recipient_public_key.len()).ok_or_else(|| {
            BastionError::KemFailure {
                reason: format!(
                    "public key of {} bytes matches no supported security level",
                    recipient_public_key.len()
                ),
            }
        })?;

        let encapsulation = self.provider.encapsulate(level, recipient_public_key)?;
        let key = derive_key(&encapsulation.shared_secret)?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
        let aead_ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: aad.unwrap_or_default(),
                },
            )
            .map_err(|_| BastionError::EncryptionFailed {
                reason: "AES-256-GCM encryption failed".to_string(),
            })?;

        Ok(HybridCiphertext {
            kem_ciphertext: encapsulation.ciphertext,
            nonce,
            aead_ciphertext,
            algorithm: self.algorithm(level),
        })
    }

    /// Decrypt `ciphertext` with `recipient_secret_key`.
    ///
    /// Returns `BastionError::DecryptionFailed` on any failure: algorithm
    /// mismatch, wrong key, tampered bytes, or AAD mismatch.
    pub fn decrypt(
        &self,
        ciphertext: &HybridCiphertext,
        recipient_secret_key: &[u8],
        aad: Option<&[u8]>,
    ) -> BastionResult<Vec<u8>> {
        let started = Instant::now();
        let result = self.decrypt_inner(ciphertext, recipient_secret_key, aad);
        self.logger.log_crypto_operation(
            "hybrid_decrypt",
            &ciphertext.algorithm,
            result.is_some(),
            Some(started.elapsed()),
        );
        result.ok_or(BastionError::DecryptionFailed)
    }

    fn decrypt_inner(
        &self,
        ciphertext: &HybridCiphertext,
        recipient_secret_key: &[u8],
        aad: Option<&[u8]>,
    ) -> Option<Vec<u8>> {
        let level = SecurityLevel::from_secret_key_len(recipient_secret_key.len())?;
        if ciphertext.algorithm != self.algorithm(level) {
            debug!(
                expected = %self.algorithm(level),
                actual = %ciphertext.algorithm,
                "hybrid algorithm mismatch"
            );
            return None;
        }

        let shared = self
            .provider
            .decapsulate(level, &ciphertext.kem_ciphertext, recipient_secret_key)
            .ok()?;
        let key = derive_key(&shared).ok()?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
        cipher
            .decrypt(
                Nonce::from_slice(&ciphertext.nonce),
                Payload {
                    msg: &ciphertext.aead_ciphertext,
                    aad: aad.unwrap_or_default(),
                },
            )
            .ok()
    }
}

#[cfg(feature = "ml-kem")]
fn ml_kem_provider() -> BastionResult<Arc<dyn KeyEncapsulationProvider>> {
    Ok(Arc::new(crate::kem::MlKemProvider::new()))
}

#[cfg(not(feature = "ml-kem"))]
fn ml_kem_provider() -> BastionResult<Arc<dyn KeyEncapsulationProvider>> {
    Err(BastionError::ConfigError {
        reason: "pqc.backend = \"ml-kem\" requires the `ml-kem` feature".to_string(),
    })
}

/// HKDF-SHA256 expansion of the KEM shared secret into an AES-256 key.
fn derive_key(shared: &SharedSecret) -> BastionResult<Zeroizing<[u8; 32]>> {
    let hk = Hkdf::<Sha256>::new(Some(&HKDF_SALT), shared.as_bytes());
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(HKDF_INFO, &mut okm[..])
        .map_err(|e| BastionError::EncryptionFailed {
            reason: format!("HKDF expansion failed: {}", e),
        })?;
    Ok(okm)
}
