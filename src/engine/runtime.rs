// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::core::ConsumerCore;
use super::{ConsumerCommand, ConsumerEvent, EngineOptions};
use crate::cursor::CommitLedger;
use crate::dispatch::{Dispatcher, Outcome, OutcomeReport, OutcomeTotals, SkipReason, WorkerPool};
use crate::errors::Result;
use crate::feed::{ChangeFeed, FeedItem, FeedStream, SeqToken};

/// Requests a graceful stop of a running [`Runtime`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// What a finished run leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub totals: OutcomeTotals,
    /// Cursor as persisted when the run ended.
    pub durable: SeqToken,
    /// Events that failed and will be replayed on the next run.
    pub failed: Vec<SeqToken>,
    pub reconnects: u32,
}

/// Async shell around [`ConsumerCore`].
///
/// Reads the feed subscription, the reconnect timer, the failed-event retry
/// timer and the shutdown signal, feeds them to the core and executes the
/// resulting commands against the commit ledger and the worker pool.
pub struct Runtime {
    core: ConsumerCore,
    options: EngineOptions,
    feed: Arc<dyn ChangeFeed>,
    dispatcher: Arc<Dispatcher>,
    ledger: Arc<CommitLedger>,
    reports: Option<mpsc::UnboundedSender<OutcomeReport>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    stream: Option<FeedStream>,
    reconnect_at: Option<Instant>,
    pending: VecDeque<ConsumerEvent>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("options", &self.options)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        dispatcher: Arc<Dispatcher>,
        ledger: Arc<CommitLedger>,
        options: EngineOptions,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            core: ConsumerCore::new(&options),
            options,
            feed,
            dispatcher,
            ledger,
            reports: None,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            stream: None,
            reconnect_at: None,
            pending: VecDeque::new(),
        }
    }

    /// Also send every dispatch outcome to `reports`.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<OutcomeReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Consume the feed until shutdown is requested.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!(
            workers = self.options.workers,
            since = %self.ledger.durable(),
            "change feed consumer started"
        );

        let pool = WorkerPool::spawn(
            self.options.workers,
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.ledger),
            self.reports.clone(),
        );

        let period = self.options.retry_failed_after.max(Duration::from_millis(1));
        let mut retry = tokio::time::interval_at(Instant::now() + period, period);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.pending.push_back(ConsumerEvent::Start);
        loop {
            let event = match self.pending.pop_front() {
                Some(e) => e,
                None => self.next_event(&mut retry).await,
            };

            let step = self.core.step(event);
            for command in step.commands {
                self.execute(command, &pool).await;
            }

            if !step.keep_running {
                break;
            }
        }

        // Running handlers finish; queued events stay unacknowledged.
        self.stream = None;
        pool.stop().await;
        if let Err(err) = self.ledger.flush() {
            warn!(error = %err, "final cursor flush failed");
        }

        let summary = RunSummary {
            totals: self.dispatcher.counters().totals(),
            durable: self.ledger.durable(),
            failed: self.ledger.failed(),
            reconnects: self.core.reconnects(),
        };
        info!(
            handled = summary.totals.handled,
            skipped = summary.totals.skipped,
            failed = summary.totals.failed,
            cursor = %summary.durable,
            reconnects = summary.reconnects,
            "change feed consumer stopped"
        );
        Ok(summary)
    }

    /// Wait for the next input: shutdown, a feed item, the reconnect timer or
    /// a retry tick while failed events pin the cursor.
    async fn next_event(&mut self, retry: &mut Interval) -> ConsumerEvent {
        loop {
            let reconnect_at = self.reconnect_at;
            let stream = self.stream.as_mut();

            tokio::select! {
                biased;
                _ = self.shutdown_rx.wait_for(|stop| *stop) => {
                    return ConsumerEvent::ShutdownRequested;
                }
                item = recv_item(stream) => {
                    return match item {
                        Some(FeedItem::Change(change)) => ConsumerEvent::Change(change),
                        Some(FeedItem::Malformed { sequence, reason }) => {
                            ConsumerEvent::Malformed { sequence, reason }
                        }
                        Some(FeedItem::Disconnected(reason)) => {
                            self.stream = None;
                            ConsumerEvent::Disconnected(reason)
                        }
                        None => {
                            self.stream = None;
                            ConsumerEvent::Disconnected("subscription closed".to_string())
                        }
                    };
                }
                _ = sleep_until(reconnect_at) => {
                    self.reconnect_at = None;
                    return ConsumerEvent::ReconnectDue;
                }
                _ = retry.tick() => {
                    if self.stream.is_some() && self.ledger.has_failed() {
                        info!(failed = ?self.ledger.failed(), "replaying failed events");
                        return ConsumerEvent::RetryFailedDue;
                    }
                }
            }
        }
    }

    async fn execute(&mut self, command: ConsumerCommand, pool: &WorkerPool) {
        match command {
            ConsumerCommand::Subscribe => self.subscribe().await,
            ConsumerCommand::Dispatch(change) => {
                let admission = self.ledger.admit(&change.sequence);
                if !admission.should_dispatch() {
                    debug!(
                        seq = %change.sequence,
                        doc_id = %change.document_id,
                        ?admission,
                        "redelivered event not dispatched again"
                    );
                    return;
                }
                // The pool records an unqueued event as failed.
                if let Err(err) = pool.submit(change).await {
                    warn!(error = %err, "could not queue event");
                }
            }
            ConsumerCommand::ReportMalformed { sequence, reason } => {
                self.report_malformed(sequence, reason);
            }
            ConsumerCommand::ScheduleReconnect { delay, .. } => {
                self.stream = None;
                self.reconnect_at = Some(Instant::now() + delay);
            }
            ConsumerCommand::Stop => {
                info!("shutdown requested; finishing in-flight dispatches");
            }
        }
    }

    async fn subscribe(&mut self) {
        // Resume from what is persisted, not from what was merely observed.
        self.stream = None;
        let since = self.ledger.durable();
        debug!(%since, "subscribing to change feed");

        let result = tokio::select! {
            biased;
            _ = self.shutdown_rx.wait_for(|stop| *stop) => {
                self.pending.push_back(ConsumerEvent::ShutdownRequested);
                return;
            }
            result = self.feed.subscribe(since) => result,
        };

        match result {
            Ok(stream) => {
                self.stream = Some(stream);
                self.pending.push_back(ConsumerEvent::Connected);
            }
            Err(err) => {
                self.pending
                    .push_back(ConsumerEvent::ConnectFailed(err.to_string()));
            }
        }
    }

    fn report_malformed(&mut self, sequence: Option<SeqToken>, reason: String) {
        let outcome = Outcome::Skipped(SkipReason::Malformed(reason));

        let Some(seq) = sequence else {
            // Without a token there is nothing to acknowledge.
            self.dispatcher.observe(&SeqToken::start(), "<unknown>", &outcome);
            return;
        };

        if !self.ledger.admit(&seq).should_dispatch() {
            return;
        }
        self.dispatcher.observe(&seq, "<unknown>", &outcome);
        let _ = self.ledger.complete(&seq, true);

        if let Some(reports) = &self.reports {
            let _ = reports.send(OutcomeReport {
                sequence: seq,
                document_id: String::new(),
                outcome,
            });
        }
    }
}

async fn recv_item(stream: Option<&mut FeedStream>) -> Option<FeedItem> {
    match stream {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
