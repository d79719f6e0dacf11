//! `KeyEncapsulationProvider` implementations.
//!
//! - `MlKemProvider` wraps the RustCrypto `ml-kem` crate (feature `ml-kem`).
//! - `SimulatedKemProvider` mimics ML-KEM's key and ciphertext sizes with
//!   SHA-256 and a seedable RNG. Its public key reveals the binding secret, so
//!   it provides NO confidentiality at all; it exists so that code paths
//!   depending on a KEM stay testable where the real primitive is unavailable.

use std::sync::{Mutex, PoisonError};

use rand::{rngs::StdRng, RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use tracing::warn;

use bastion_contracts::{
    crypto::{Encapsulation, SecretBytes, SecurityLevel, SharedSecret},
    error::{BastionError, BastionResult},
};
use bastion_core::traits::KeyEncapsulationProvider;

/// Domain separator for the simulated binding key.
const SIMULATED_DOMAIN: &[u8] = b"bastion-simulated-kem-v1";

/// Length of the seed at the front of a simulated secret key.
const SIMULATED_SEED_LEN: usize = 32;

// ── Simulated provider ────────────────────────────────────────────────────────

/// Insecure stand-in for ML-KEM.
///
/// Algorithm names carry a `SIMULATED-` prefix so ciphertexts produced with
/// it can never be mistaken for real hybrid ciphertexts.
pub struct SimulatedKemProvider {
    rng: Mutex<StdRng>,
}

impl SimulatedKemProvider {
    /// Create a provider seeded from OS entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a provider whose keys and ciphertexts are fully determined by
    /// `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        // Printed unconditionally; log filters must not be able to hide it.
        eprintln!(
            "WARNING: using simulated KEM provider - NOT QUANTUM RESISTANT, NOT CONFIDENTIAL. \
             Use the ml-kem backend outside of tests."
        );
        warn!("simulated KEM provider constructed; ciphertexts are not quantum resistant");
        Self {
            rng: Mutex::new(rng),
        }
    }

    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fill_bytes(&mut out);
        out
    }

    fn binding_key(seed: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(SIMULATED_DOMAIN);
        hasher.update(seed);
        hasher.finalize().into()
    }

    fn shared_secret(binding_key: &[u8], ciphertext: &[u8]) -> SharedSecret {
        let mut hasher = Sha256::new();
        hasher.update(binding_key);
        hasher.update(ciphertext);
        SharedSecret::from_bytes(hasher.finalize().into())
    }
}

impl Default for SimulatedKemProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyEncapsulationProvider for SimulatedKemProvider {
    fn algorithm(&self, level: SecurityLevel) -> String {
        format!("SIMULATED-KEM-{}", level.level())
    }

    fn generate_keypair(&self, level: SecurityLevel) -> BastionResult<(Vec<u8>, SecretBytes)> {
        let secret_key = self.random_bytes(level.secret_key_len());
        let binding = Self::binding_key(&secret_key[..SIMULATED_SEED_LEN]);

        let mut public_key = binding.to_vec();
        public_key.extend(self.random_bytes(level.public_key_len() - binding.len()));

        Ok((public_key, SecretBytes::new(secret_key)))
    }

    fn encapsulate(&self, level: SecurityLevel, public_key: &[u8]) -> BastionResult<Encapsulation> {
        if public_key.len() != level.public_key_len() {
            return Err(BastionError::KemFailure {
                reason: format!(
                    "public key is {} bytes, expected {} for level {}",
                    public_key.len(),
                    level.public_key_len(),
                    level
                ),
            });
        }

        let ciphertext = self.random_bytes(level.ciphertext_len());
        let shared_secret = Self::shared_secret(&public_key[..32], &ciphertext);
        Ok(Encapsulation {
            ciphertext,
            shared_secret,
        })
    }

    fn decapsulate(
        &self,
        level: SecurityLevel,
        ciphertext: &[u8],
        secret_key: &[u8],
    ) -> BastionResult<SharedSecret> {
        if secret_key.len() != level.secret_key_len() {
            return Err(BastionError::KemFailure {
                reason: format!(
                    "secret key is {} bytes, expected {}",
                    secret_key.len(),
                    level.secret_key_len()
                ),
            });
        }
        if ciphertext.len() != level.ciphertext_len() {
            return Err(BastionError::KemFailure {
                reason: format!(
                    "KEM ciphertext is {} bytes, expected {}",
                    ciphertext.len(),
                    level.ciphertext_len()
                ),
            });
        }

        let binding = Self::binding_key(&secret_key[..SIMULATED_SEED_LEN]);
        Ok(Self::shared_secret(&binding, ciphertext))
    }
}

// ── ML-KEM provider ───────────────────────────────────────────────────────────

#[cfg(feature = "ml-kem")]
pub use real::MlKemProvider;

#[cfg(feature = "ml-kem")]
mod real {
    use ml_kem::{
        kem::{Decapsulate, Encapsulate},
        Ciphertext, Encoded, EncodedSizeUser, KemCore, MlKem1024, MlKem768,
    };
    use rand::rngs::OsRng;

    use bastion_contracts::{
        crypto::{Encapsulation, SecretBytes, SecurityLevel, SharedSecret},
        error::{BastionError, BastionResult},
    };
    use bastion_core::traits::KeyEncapsulationProvider;

    /// FIPS 203 ML-KEM backed by the RustCrypto implementation.
    ///
    /// Stateless: every call draws fresh randomness from the OS.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct MlKemProvider;

    impl MlKemProvider {
        pub fn new() -> Self {
            Self
        }
    }

    fn generate<K: KemCore>() -> (Vec<u8>, SecretBytes) {
        let (dk, ek) = K::generate(&mut OsRng);
        let public_key = ek.as_bytes().to_vec();
        let secret_key = SecretBytes::new(dk.as_bytes().to_vec());
        (public_key, secret_key)
    }

    fn encapsulate<K: KemCore>(public_key: &[u8]) -> BastionResult<Encapsulation> {
        let encoded = Encoded::<K::EncapsulationKey>::try_from(public_key).map_err(|_| {
            BastionError::KemFailure {
                reason: format!("malformed ML-KEM public key of {} bytes", public_key.len()),
            }
        })?;
        let ek = K::EncapsulationKey::from_bytes(&encoded);

        let (ciphertext, shared) = ek.encapsulate(&mut OsRng).map_err(|_| BastionError::KemFailure {
            reason: "ML-KEM encapsulation failed".to_string(),
        })?;

        Ok(Encapsulation {
            ciphertext: ciphertext.to_vec(),
            shared_secret: to_shared_secret(shared.as_slice())?,
        })
    }

    fn decapsulate<K: KemCore>(ciphertext: &[u8], secret_key: &[u8]) -> BastionResult<SharedSecret> {
        let encoded = Encoded::<K::DecapsulationKey>::try_from(secret_key).map_err(|_| {
            BastionError::KemFailure {
                reason: format!("malformed ML-KEM secret key of {} bytes", secret_key.len()),
            }
        })?;
        let dk = K::DecapsulationKey::from_bytes(&encoded);

        let ct = Ciphertext::<K>::try_from(ciphertext).map_err(|_| BastionError::KemFailure {
            reason: format!("malformed ML-KEM ciphertext of {} bytes", ciphertext.len()),
        })?;

        let shared = dk.decapsulate(&ct).map_err(|_| BastionError::KemFailure {
            reason: "ML-KEM decapsulation failed".to_string(),
        })?;
        to_shared_secret(shared.as_slice())
    }

    fn to_shared_secret(bytes: &[u8]) -> BastionResult<SharedSecret> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| BastionError::KemFailure {
            reason: format!("shared secret is {} bytes, expected 32", bytes.len()),
        })?;
        Ok(SharedSecret::from_bytes(array))
    }

    impl KeyEncapsulationProvider for MlKemProvider {
        fn algorithm(&self, level: SecurityLevel) -> String {
            format!("ML-KEM-{}", level.level())
        }

        fn generate_keypair(&self, level: SecurityLevel) -> BastionResult<(Vec<u8>, SecretBytes)> {
            Ok(match level {
                SecurityLevel::MlKem768 => generate::<MlKem768>(),
                SecurityLevel::MlKem1024 => generate::<MlKem1024>(),
            })
        }

        fn encapsulate(&self, level: SecurityLevel, public_key: &[u8]) -> BastionResult<Encapsulation> {
            match level {
                SecurityLevel::MlKem768 => encapsulate::<MlKem768>(public_key),
                SecurityLevel::MlKem1024 => encapsulate::<MlKem1024>(public_key),
            }
        }

        fn decapsulate(
            &self,
            level: SecurityLevel,
            ciphertext: &[u8],
            secret_key: &[u8],
        ) -> BastionResult<SharedSecret> {
            match level {
                SecurityLevel::MlKem768 => decapsulate::<MlKem768>(ciphertext, secret_key),
                SecurityLevel::MlKem1024 => decapsulate::<MlKem1024>(ciphertext, secret_key),
            }
        }
    }
}
