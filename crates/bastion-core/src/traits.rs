//! Collaborator trait definitions.
//!
//! These three traits are the seams between the Bastion engines and the
//! outside world:
//!
//! - `KeyEncapsulationProvider`: the KEM primitive, real ML-KEM or simulated
//! - `ExternalLedgerClient`: where batch roots get anchored
//! - `EventLogger`: fire-and-forget security telemetry
//!
//! Engines receive implementations through their constructors; nothing is
//! looked up globally.

use std::time::Duration;

use async_trait::async_trait;

use bastion_contracts::{
    batch::Hash32,
    crypto::{Encapsulation, SecretBytes, SecurityLevel, SharedSecret},
    error::BastionResult,
};

/// A key encapsulation mechanism.
///
/// Implementations must fail loudly on malformed keys or ciphertexts: a
/// provider that returns an all-zero secret instead of an error silently
/// breaks confidentiality.
pub trait KeyEncapsulationProvider: Send + Sync {
    /// Algorithm name for `level`, e.g. `ML-KEM-768`.
    fn algorithm(&self, level: SecurityLevel) -> String;

    /// Generate `(public_key, secret_key)` for `level`.
    fn generate_keypair(&self, level: SecurityLevel) -> BastionResult<(Vec<u8>, SecretBytes)>;

    /// Encapsulate a fresh shared secret against `public_key`.
    fn encapsulate(&self, level: SecurityLevel, public_key: &[u8]) -> BastionResult<Encapsulation>;

    /// Recover the shared secret from `ciphertext` with `secret_key`.
    fn decapsulate(
        &self,
        level: SecurityLevel,
        ciphertext: &[u8],
        secret_key: &[u8],
    ) -> BastionResult<SharedSecret>;
}

/// Receipt returned by the external ledger for a submitted root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReceipt {
    /// Transaction hash.
    pub tx_hash: String,
    /// Block the transaction landed in.
    pub block_number: u64,
    /// Whether the ledger marked the transaction successful.
    pub success: bool,
}

/// An external, append-only ledger that stores batch roots.
///
/// The ledger is only ever asked to record a root and to confirm that a
/// recorded transaction exists. Proof data is never reconstructed from it.
#[async_trait]
pub trait ExternalLedgerClient: Send + Sync {
    /// Record a 32-byte Merkle root.
    async fn submit(&self, root: Hash32) -> BastionResult<LedgerReceipt>;

    /// Look up a previously submitted transaction.
    async fn get_receipt(&self, tx_hash: &str) -> BastionResult<Option<LedgerReceipt>>;
}

/// Security event sink.
///
/// Calls are fire-and-forget: implementations must swallow their own
/// failures and never panic back into the engine that reported the event.
pub trait EventLogger: Send + Sync {
    /// A cryptographic operation finished (successfully or not).
    fn log_crypto_operation(
        &self,
        operation: &str,
        algorithm: &str,
        success: bool,
        duration: Option<Duration>,
    );

    /// Something happened while anchoring a batch.
    fn log_anchor_event(&self, event_type: &str, batch_id: &str, success: bool, detail: Option<&str>);
}
