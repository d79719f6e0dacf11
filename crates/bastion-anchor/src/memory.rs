//! In-memory `ExternalLedgerClient`.
//!
//! A single-process stand-in for a chain: every submitted root lands in the
//! next block, transaction hashes are derived from the root and block
//! number, and failures, reverts and latency can be injected for tests.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use bastion_contracts::{
    batch::Hash32,
    error::{BastionError, BastionResult},
};
use bastion_core::traits::{ExternalLedgerClient, LedgerReceipt};

#[derive(Default)]
struct ChainState {
    next_block: u64,
    receipts: HashMap<String, LedgerReceipt>,
    roots: Vec<Hash32>,
    attempts: usize,
    fail_remaining: u32,
    revert_remaining: u32,
    latency: Option<Duration>,
}

#[derive(Default)]
pub struct InMemoryLedgerClient {
    state: Mutex<ChainState>,
}

impl InMemoryLedgerClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `n` submissions return an error.
    pub fn fail_next(&self, n: u32) {
        self.state().fail_remaining = n;
    }

    /// Make the next `n` submissions mine a reverted transaction.
    pub fn revert_next(&self, n: u32) {
        self.state().revert_remaining = n;
    }

    /// Delay every submission by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// Roots that were successfully recorded, in order.
    pub fn anchored_roots(&self) -> Vec<Hash32> {
        self.state().roots.clone()
    }

    /// Submission attempts seen, including failed ones.
    pub fn attempts(&self) -> usize {
        self.state().attempts
    }
}

#[async_trait]
impl ExternalLedgerClient for InMemoryLedgerClient {
    async fn submit(&self, root: Hash32) -> BastionResult<LedgerReceipt> {
        let latency = {
            let mut state = self.state();
            state.attempts += 1;
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            return Err(BastionError::StorageError {
                reason: "ledger node unavailable".to_string(),
            });
        }

        state.next_block += 1;
        let block_number = state.next_block;
        let mut hasher = Sha256::new();
        hasher.update(root);
        hasher.update(block_number.to_be_bytes());
        let tx_hash = format!("0x{}", hex::encode(hasher.finalize()));

        let success = if state.revert_remaining > 0 {
            state.revert_remaining -= 1;
            false
        } else {
            state.roots.push(root);
            true
        };

        let receipt = LedgerReceipt {
            tx_hash: tx_hash.clone(),
            block_number,
            success,
        };
        state.receipts.insert(tx_hash, receipt.clone());
        Ok(receipt)
    }

    async fn get_receipt(&self, tx_hash: &str) -> BastionResult<Option<LedgerReceipt>> {
        Ok(self.state().receipts.get(tx_hash).cloned())
    }
}
