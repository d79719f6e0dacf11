//! # bastion-pqc
//!
//! Hybrid post-quantum encryption for the Bastion security framework.
//!
//! A fresh ML-KEM shared secret is expanded with HKDF-SHA256 into an
//! AES-256-GCM key, so a payload stays confidential as long as either the
//! lattice KEM or AES holds.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bastion_pqc::{HybridEncryptionEngine, MlKemProvider};
//!
//! let engine = HybridEncryptionEngine::new(Arc::new(MlKemProvider::new()), logger);
//! let keypair = engine.generate_keypair(768)?;
//! let ct = engine.encrypt(b"hello quantum world", &keypair.public_key, None)?;
//! let wire = ct.to_bytes();
//! ```

pub mod hybrid;
pub mod kem;

pub use hybrid::{HybridEncryptionEngine, HKDF_INFO};
#[cfg(feature = "ml-kem")]
pub use kem::MlKemProvider;
pub use kem::SimulatedKemProvider;

// ── Tests ─────────────────────────────────────────────────────────────────────
