//! Background anchoring worker.
//!
//! Callers add records synchronously; sealed batches travel over an mpsc
//! channel to a single tokio task that submits them one by one. A ticker
//! lets the worker seal batches that sit open past `batch_timeout` even when
//! no new records arrive.
//!
//! Every batch is queued while the ledger's pending lock is still held, so
//! the worker submits batches in exactly the order the ledger sealed them.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, error};

use bastion_audit::AuditLedger;
use bastion_contracts::{
    batch::{AnchorSubmission, Batch},
    error::{BastionError, BastionResult},
    record::AuditRecord,
};

use crate::submitter::AnchorSubmitter;

pub struct AnchorPipeline {
    ledger: Arc<AuditLedger>,
    submitter: Arc<AnchorSubmitter>,
    sender: mpsc::UnboundedSender<Batch>,
    worker: JoinHandle<Vec<AnchorSubmission>>,
}

impl AnchorPipeline {
    /// Start the worker on the current tokio runtime.
    ///
    /// `tick` is how often the worker checks the pending batch for expiry.
    pub fn spawn(ledger: Arc<AuditLedger>, submitter: Arc<AnchorSubmitter>, tick: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(
            Arc::clone(&ledger),
            Arc::clone(&submitter),
            receiver,
            tick,
        ));
        Self {
            ledger,
            submitter,
            sender,
            worker,
        }
    }

    pub fn ledger(&self) -> &Arc<AuditLedger> {
        &self.ledger
    }

    pub fn submitter(&self) -> &Arc<AnchorSubmitter> {
        &self.submitter
    }

    /// Add `record` to the ledger's pending batch, handing any batch it
    /// seals to the worker.
    pub fn record(&self, record: AuditRecord) -> BastionResult<()> {
        self.ledger.add_to_batch_with(record, |batch| self.enqueue(batch))?;
        Ok(())
    }

    /// Queue a sealed batch. If the worker is gone the batch is parked so
    /// its records are not lost.
    fn enqueue(&self, batch: Batch) -> BastionResult<()> {
        match self.sender.send(batch) {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendError(batch)) => {
                let path = self.submitter.cache().park(&batch)?;
                error!(batch_id = %batch.batch_id(), parked_at = %path.display(), "anchor worker stopped; batch parked");
                Err(BastionError::StorageError {
                    reason: format!("anchor worker stopped; batch '{}' parked", batch.batch_id()),
                })
            }
        }
    }

    /// Stop accepting batches, drain the queue, seal and submit whatever is
    /// still pending, and return every submission the worker made.
    pub async fn shutdown(self) -> BastionResult<Vec<AnchorSubmission>> {
        drop(self.sender);
        self.worker.await.map_err(|e| BastionError::StorageError {
            reason: format!("anchor worker failed: {}", e),
        })
    }
}

async fn run_worker(
    ledger: Arc<AuditLedger>,
    submitter: Arc<AnchorSubmitter>,
    mut receiver: mpsc::UnboundedReceiver<Batch>,
    tick: Duration,
) -> Vec<AnchorSubmission> {
    let mut submitted = Vec::new();
    let mut queued: VecDeque<Batch> = VecDeque::new();
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if let Some(batch) = queued.pop_front() {
            submit(&submitter, batch, &mut submitted).await;
            continue;
        }

        let tick_fired = tokio::select! {
            biased;

            next = receiver.recv() => match next {
                Some(batch) => {
                    queued.push_back(batch);
                    false
                }
                None => break,
            },
            _ = ticker.tick() => true,
        };

        if tick_fired {
            // Batches sealed before this one are already in the channel.
            let timed = ledger.flush_if_expired_with(|batch| {
                while let Ok(earlier) = receiver.try_recv() {
                    queued.push_back(earlier);
                }
                queued.push_back(batch);
                Ok(())
            });
            if let Err(e) = timed {
                error!(error = %e, "timed flush failed");
            }
        }
    }

    match ledger.flush() {
        Ok(Some(batch)) => submit(&submitter, batch, &mut submitted).await,
        Ok(None) => {}
        Err(e) => error!(error = %e, "final flush failed"),
    }
    debug!(submitted = submitted.len(), "anchor worker stopped");
    submitted
}

async fn submit(submitter: &AnchorSubmitter, batch: Batch, submitted: &mut Vec<AnchorSubmission>) {
    let batch_id = batch.batch_id().to_string();
    match submitter.submit(batch).await {
        Ok(Some(submission)) => submitted.push(submission),
        Ok(None) => {}
        Err(e) => error!(batch_id = %batch_id, error = %e, "batch submission failed"),
    }
}
