//! Key material and hybrid ciphertext types.
//!
//! Secret material (`SecretBytes`, `SharedSecret`) zeroizes on drop and never
//! prints its contents through `Debug`. `HybridCiphertext` owns the binary
//! wire format:
//!
//! ```text
//! u32_be(len(kem_ciphertext)) || kem_ciphertext || nonce[12] || aead_ciphertext
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{BastionError, BastionResult};

/// AEAD nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Length of the big-endian KEM ciphertext length prefix.
const LENGTH_PREFIX_LEN: usize = 4;

/// ML-KEM parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityLevel {
    /// ML-KEM-768, NIST category 3.
    MlKem768,
    /// ML-KEM-1024, NIST category 5.
    MlKem1024,
}

impl SecurityLevel {
    /// Map a numeric level to a parameter set.
    ///
    /// Returns `BastionError::UnsupportedSecurityLevel` for anything but 768
    /// and 1024.
    pub fn from_level(level: i64) -> BastionResult<Self> {
        match level {
            768 => Ok(SecurityLevel::MlKem768),
            1024 => Ok(SecurityLevel::MlKem1024),
            other => Err(BastionError::UnsupportedSecurityLevel { level: other }),
        }
    }

    pub fn level(self) -> u16 {
        match self {
            SecurityLevel::MlKem768 => 768,
            SecurityLevel::MlKem1024 => 1024,
        }
    }

    /// Encoded encapsulation (public) key size.
    pub fn public_key_len(self) -> usize {
        match self {
            SecurityLevel::MlKem768 => 1184,
            SecurityLevel::MlKem1024 => 1568,
        }
    }

    /// Encoded decapsulation (secret) key size.
    pub fn secret_key_len(self) -> usize {
        match self {
            SecurityLevel::MlKem768 => 2400,
            SecurityLevel::MlKem1024 => 3168,
        }
    }

    /// KEM ciphertext size.
    pub fn ciphertext_len(self) -> usize {
        match self {
            SecurityLevel::MlKem768 => 1088,
            SecurityLevel::MlKem1024 => 1568,
        }
    }

    /// Identify the parameter set from an encoded public key's length.
    pub fn from_public_key_len(len: usize) -> Option<Self> {
        [SecurityLevel::MlKem768, SecurityLevel::MlKem1024]
            .into_iter()
            .find(|level| level.public_key_len() == len)
    }

    /// Identify the parameter set from an encoded secret key's length.
    pub fn from_secret_key_len(len: usize) -> Option<Self> {
        [SecurityLevel::MlKem768, SecurityLevel::MlKem1024]
            .into_iter()
            .find(|level| level.secret_key_len() == len)
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// Secret key bytes, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes(<redacted {} bytes>)", self.0.len())
    }
}

/// A 256-bit KEM shared secret, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Output of a KEM encapsulation.
#[derive(Debug)]
pub struct Encapsulation {
    /// Sent to the recipient alongside the AEAD ciphertext.
    pub ciphertext: Vec<u8>,
    /// Never leaves the sender; fed into the KDF.
    pub shared_secret: SharedSecret,
}

/// An ML-KEM key pair. Immutable after creation.
///
/// Intentionally not `Serialize`: the secret half must never end up in an
/// audit trail. Log `key_id` or `public_key_fingerprint()` instead.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: Vec<u8>,
    pub secret_key: SecretBytes,
    pub algorithm: String,
    pub key_id: String,
    pub created_at: DateTime<Utc>,
}

impl KeyPair {
    /// Wrap freshly generated key material with a new id and timestamp.
    pub fn new(public_key: Vec<u8>, secret_key: SecretBytes, algorithm: impl Into<String>) -> Self {
        Self {
            public_key,
            secret_key,
            algorithm: algorithm.into(),
            key_id: uuid::Uuid::new_v4().simple().to_string(),
            created_at: Utc::now(),
        }
    }

    /// First 16 hex chars of SHA-256(public_key).
    pub fn public_key_fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.public_key);
        hex::encode(digest)[..16].to_string()
    }
}

/// A hybrid KEM + AEAD ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridCiphertext {
    /// Encapsulated key material for the recipient.
    pub kem_ciphertext: Vec<u8>,
    /// Fresh random AEAD nonce.
    pub nonce: [u8; NONCE_LEN],
    /// AEAD output with the authentication tag appended.
    pub aead_ciphertext: Vec<u8>,
    /// Algorithm identifier, e.g. `HYBRID-ML-KEM-768-AES256GCM`.
    pub algorithm: String,
}

impl HybridCiphertext {
    /// Encode to the binary wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            LENGTH_PREFIX_LEN + self.kem_ciphertext.len() + NONCE_LEN + self.aead_ciphertext.len(),
        );
        // KEM ciphertexts are at most 1568 bytes, far below u32::MAX.
        out.extend_from_slice(&(self.kem_ciphertext.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.kem_ciphertext);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.aead_ciphertext);
        out
    }

    /// Decode from the binary wire format.
    ///
    /// The algorithm is not part of the wire bytes and must be supplied by
    /// the caller. Returns `BastionError::MalformedCiphertext` when the
    /// length prefix is missing or declares more bytes than are present.
    pub fn from_bytes(data: &[u8], algorithm: impl Into<String>) -> BastionResult<Self> {
        if data.len() < LENGTH_PREFIX_LEN {
            return Err(BastionError::MalformedCiphertext {
                reason: format!(
                    "need at least {} bytes for the length prefix, got {}",
                    LENGTH_PREFIX_LEN,
                    data.len()
                ),
            });
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&data[..LENGTH_PREFIX_LEN]);
        let kem_len = u32::from_be_bytes(prefix) as usize;

        let kem_end = LENGTH_PREFIX_LEN
            .checked_add(kem_len)
            .ok_or_else(|| BastionError::MalformedCiphertext {
                reason: "declared KEM ciphertext length overflows".to_string(),
            })?;
        let nonce_end = kem_end.saturating_add(NONCE_LEN);
        if nonce_end > data.len() {
            return Err(BastionError::MalformedCiphertext {
                reason: format!(
                    "declared KEM ciphertext length {} plus nonce exceeds buffer of {} bytes",
                    kem_len,
                    data.len()
                ),
            });
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&data[kem_end..nonce_end]);

        Ok(Self {
            kem_ciphertext: data[LENGTH_PREFIX_LEN..kem_end].to_vec(),
            nonce,
            aead_ciphertext: data[nonce_end..].to_vec(),
            algorithm: algorithm.into(),
        })
    }
}
