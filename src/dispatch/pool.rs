// src/dispatch/pool.rs

//! Per-document worker pool.
//!
//! Every document id hashes to one worker shard. A shard handles its events
//! one at a time in arrival order, and records each outcome in the commit
//! ledger before taking the next job, so two changes to the same document are
//! never in a handler at once and the cursor never runs ahead of the work.
//! Different documents on different shards run concurrently.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dispatcher::Dispatcher;
use super::outcome::OutcomeReport;
use crate::cursor::CommitLedger;
use crate::errors::{Result, YggError};
use crate::feed::ChangeEvent;

/// Queue depth of each shard.
pub const SHARD_QUEUE_CAPACITY: usize = 64;

/// Shard index for a document id.
pub fn shard_for(document_id: &str, shards: usize) -> usize {
    let hash = blake3::hash(document_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    (u64::from_le_bytes(prefix) % shards.max(1) as u64) as usize
}

#[derive(Debug)]
pub struct WorkerPool {
    shards: Vec<mpsc::Sender<ChangeEvent>>,
    workers: Vec<JoinHandle<()>>,
    stop_tx: watch::Sender<bool>,
    ledger: Arc<CommitLedger>,
}

impl WorkerPool {
    /// Start `workers` shard workers (at least one).
    ///
    /// When `reports` is given, every outcome is also sent there.
    pub fn spawn(
        workers: usize,
        dispatcher: Arc<Dispatcher>,
        ledger: Arc<CommitLedger>,
        reports: Option<mpsc::UnboundedSender<OutcomeReport>>,
    ) -> Self {
        let workers = workers.max(1);
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut shards = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for shard in 0..workers {
            let (tx, rx) = mpsc::channel(SHARD_QUEUE_CAPACITY);
            shards.push(tx);
            handles.push(tokio::spawn(run_worker(
                shard,
                rx,
                stop_rx.clone(),
                Arc::clone(&dispatcher),
                Arc::clone(&ledger),
                reports.clone(),
            )));
        }

        info!(workers, "dispatch worker pool started");
        Self {
            shards,
            workers: handles,
            stop_tx,
            ledger,
        }
    }

    pub fn size(&self) -> usize {
        self.shards.len()
    }

    /// Queue an admitted event on its document's shard. Waits while the
    /// shard queue is full.
    ///
    /// An event that cannot be queued is recorded as failed in the ledger, so
    /// it pins the cursor and is replayed instead of staying in flight.
    pub async fn submit(&self, event: ChangeEvent) -> Result<()> {
        let shard = shard_for(&event.document_id, self.shards.len());
        debug!(seq = %event.sequence, doc_id = %event.document_id, shard, "queueing event");
        match self.shards[shard].send(event).await {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendError(event)) => {
                warn!(seq = %event.sequence, shard, "dispatch worker is gone; event not queued");
                let _ = self.ledger.complete(&event.sequence, false);
                Err(YggError::Other(anyhow::anyhow!(
                    "dispatch worker {shard} is gone; event {} not queued",
                    event.sequence
                )))
            }
        }
    }

    /// Let running handlers finish, drop queued events and wait for workers
    /// to exit. Dropped events stay unacknowledged.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        drop(self.shards);
        join_all(self.workers).await;
        info!("dispatch worker pool stopped");
    }

    /// Process everything already queued, then wait for workers to exit.
    pub async fn drain(self) {
        drop(self.shards);
        join_all(self.workers).await;
        info!("dispatch worker pool drained");
    }
}

async fn join_all(workers: Vec<JoinHandle<()>>) {
    for handle in workers {
        let _ = handle.await;
    }
}

async fn run_worker(
    shard: usize,
    mut rx: mpsc::Receiver<ChangeEvent>,
    mut stop_rx: watch::Receiver<bool>,
    dispatcher: Arc<Dispatcher>,
    ledger: Arc<CommitLedger>,
    reports: Option<mpsc::UnboundedSender<OutcomeReport>>,
) {
    debug!(shard, "dispatch worker started");
    loop {
        let event = tokio::select! {
            biased;
            _ = stop_rx.wait_for(|stop| *stop) => break,
            next = rx.recv() => match next {
                Some(event) => event,
                None => break,
            },
        };

        let outcome = dispatcher.dispatch(&event).await;

        // Errors are logged by the ledger; the watermark is retried on the
        // next completion.
        let _ = ledger.complete(&event.sequence, outcome.is_acknowledged());

        if let Some(reports) = &reports {
            let _ = reports.send(OutcomeReport {
                sequence: event.sequence,
                document_id: event.document_id,
                outcome,
            });
        }
    }
    debug!(shard, "dispatch worker exiting");
}
