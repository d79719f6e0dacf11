//! Scenario 1: Hybrid Encryption
//!
//! Generates a key pair at the configured level, encrypts a message, sends
//! it through the binary wire format, decrypts it, and shows that a single
//! flipped bit or a wrong key is rejected with the same opaque error.

use std::sync::Arc;

use bastion_contracts::{
    crypto::HybridCiphertext,
    error::{BastionError, BastionResult},
};
use bastion_core::{config::BastionConfig, logger::TracingEventLogger};
use bastion_pqc::HybridEncryptionEngine;

const MESSAGE: &[u8] = b"hello quantum world";

pub fn run_scenario(config: &BastionConfig) -> BastionResult<()> {
    println!("=== Scenario 1: Hybrid Encryption ===");
    println!();

    let engine = HybridEncryptionEngine::from_config(&config.pqc, Arc::new(TracingEventLogger::new()))?;
    let level = engine.default_level();

    let keypair = engine.generate_default_keypair()?;
    println!("  KEM algorithm:          {}", keypair.algorithm);
    println!("  Key id:                 {}", keypair.key_id);
    println!("  Public key fingerprint: {}", keypair.public_key_fingerprint());
    println!("  Public key size:        {} bytes", keypair.public_key.len());

    let ciphertext = engine.encrypt(MESSAGE, &keypair.public_key, Some(b"demo"))?;
    let wire = ciphertext.to_bytes();
    println!("  Hybrid algorithm:       {}", ciphertext.algorithm);
    println!(
        "  Wire size:              {} bytes (4 + {} KEM + 12 nonce + {} AEAD)",
        wire.len(),
        ciphertext.kem_ciphertext.len(),
        ciphertext.aead_ciphertext.len()
    );

    let parsed = HybridCiphertext::from_bytes(&wire, engine.algorithm(level))?;
    let plaintext = engine.decrypt(&parsed, keypair.secret_key.as_bytes(), Some(b"demo"))?;
    println!("  Decrypted:              {:?}", String::from_utf8_lossy(&plaintext));
    if plaintext != MESSAGE {
        return Err(BastionError::EncryptionFailed {
            reason: "round trip produced different plaintext".to_string(),
        });
    }

    let mut tampered = parsed.clone();
    if let Some(byte) = tampered.aead_ciphertext.first_mut() {
        *byte ^= 0x01;
    }
    report_rejection(
        "Flipped ciphertext bit:",
        engine.decrypt(&tampered, keypair.secret_key.as_bytes(), Some(b"demo")),
    )?;

    let stranger = engine.generate_default_keypair()?;
    report_rejection(
        "Wrong secret key:      ",
        engine.decrypt(&parsed, stranger.secret_key.as_bytes(), Some(b"demo")),
    )?;

    println!("  RESULT: SUCCESS (expected)");
    println!();
    Ok(())
}

fn report_rejection(label: &str, outcome: BastionResult<Vec<u8>>) -> BastionResult<()> {
    match outcome {
        Err(BastionError::DecryptionFailed) => {
            println!("  {}  rejected (DecryptionFailed)", label);
            Ok(())
        }
        Err(e) => Err(e),
        Ok(_) => Err(BastionError::EncryptionFailed {
            reason: format!("{} unexpectedly decrypted", label.trim()),
        }),
    }
}
