#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use yggdrasil::cursor::{CommitLedger, CursorStore, MemoryCursorStore};
use yggdrasil::dispatch::{DispatchSettings, Dispatcher, OutcomeReport};
use yggdrasil::engine::{EngineOptions, RunSummary, Runtime, ShutdownHandle};
use yggdrasil::errors::Result;
use yggdrasil::feed::{ChangeFeed, SeqToken};
use yggdrasil::registry::BranchRegistry;
use yggdrasil_test_utils::{eventually, init_tracing, with_timeout};

pub fn fast_options(workers: usize) -> EngineOptions {
    EngineOptions {
        workers,
        reconnect_initial: Duration::from_millis(10),
        reconnect_max: Duration::from_millis(50),
        retry_failed_after: Duration::from_secs(60),
    }
}

/// A running consumer over a feed, with access to its outcome reports.
pub struct Harness {
    pub ledger: Arc<CommitLedger>,
    pub dispatcher: Arc<Dispatcher>,
    reports: mpsc::UnboundedReceiver<OutcomeReport>,
    shutdown: ShutdownHandle,
    task: JoinHandle<Result<RunSummary>>,
}

impl Harness {
    pub fn start(
        feed: Arc<dyn ChangeFeed>,
        registry: BranchRegistry,
        store: Box<dyn CursorStore>,
        options: EngineOptions,
        settings: DispatchSettings,
    ) -> Self {
        init_tracing();

        let ledger = Arc::new(CommitLedger::open(store).expect("cursor store should load"));
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), settings));
        let (tx, reports) = mpsc::unbounded_channel();

        let runtime = Runtime::new(feed, Arc::clone(&dispatcher), Arc::clone(&ledger), options)
            .with_reports(tx);
        let shutdown = runtime.shutdown_handle();
        let task = tokio::spawn(runtime.run());

        Self {
            ledger,
            dispatcher,
            reports,
            shutdown,
            task,
        }
    }

    /// One worker, in-memory cursor, default settings.
    pub fn simple(feed: Arc<dyn ChangeFeed>, registry: BranchRegistry) -> Self {
        Self::start(
            feed,
            registry,
            Box::new(MemoryCursorStore::new()),
            fast_options(1),
            DispatchSettings::default(),
        )
    }

    pub async fn next_report(&mut self) -> OutcomeReport {
        with_timeout(self.reports.recv())
            .await
            .expect("report channel closed")
    }

    pub async fn reports(&mut self, n: usize) -> Vec<OutcomeReport> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.next_report().await);
        }
        out.sort_by(|a, b| a.sequence.cmp(&b.sequence));
        out
    }

    /// Wait until the durable cursor reaches `seq`.
    pub async fn wait_for_cursor(&self, seq: &str) {
        let target = SeqToken::new(seq);
        eventually(&format!("cursor {seq}"), || self.ledger.durable() >= target).await;
    }

    pub async fn stop(self) -> RunSummary {
        self.shutdown.shutdown();
        with_timeout(self.task)
            .await
            .expect("runtime task panicked")
            .expect("runtime returned an error")
    }
}
