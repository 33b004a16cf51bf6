// src/engine/mod.rs

//! Change-feed consumer engine.
//!
//! The pure consumer state machine lives in [`core`]: it turns
//! [`ConsumerEvent`]s into [`ConsumerCommand`]s and tracks the
//! `Idle → Connecting → Streaming → (Disconnected → Connecting) | Stopped`
//! lifecycle. The async shell in [`runtime`] owns the feed subscription,
//! admission through the commit ledger, the worker pool and shutdown.

use std::time::Duration;

use crate::config::AppConfig;
use crate::feed::{ChangeEvent, SeqToken};

pub mod core;
pub mod runtime;

pub use self::core::ConsumerCore;
pub use self::runtime::{RunSummary, Runtime, ShutdownHandle};

/// Consumer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Connecting,
    Streaming,
    Disconnected,
    /// Terminal; only reached through a shutdown request.
    Stopped,
}

/// Inputs to the consumer core.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerEvent {
    Start,
    Connected,
    ConnectFailed(String),
    Change(ChangeEvent),
    Malformed {
        sequence: Option<SeqToken>,
        reason: String,
    },
    /// The live subscription ended.
    Disconnected(String),
    /// The reconnect delay elapsed.
    ReconnectDue,
    /// Failed events pin the cursor; replay from it.
    RetryFailedDue,
    ShutdownRequested,
}

/// Work the IO shell performs for the core.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerCommand {
    /// Open a subscription from the durable cursor, replacing any live one.
    Subscribe,
    /// Admit the event and queue it for its document's worker.
    Dispatch(ChangeEvent),
    /// Acknowledge and report an undecodable record.
    ReportMalformed {
        sequence: Option<SeqToken>,
        reason: String,
    },
    /// Drop the subscription and try again after `delay`.
    ScheduleReconnect { delay: Duration, attempt: u32 },
    /// Finish in-flight work and stop.
    Stop,
}

/// Decision returned by the core for a single event.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreStep {
    pub commands: Vec<ConsumerCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    fn run(commands: Vec<ConsumerCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn idle() -> Self {
        Self::run(Vec::new())
    }
}

/// Engine knobs taken from the application config.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub workers: usize,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    /// Period of the in-process replay of failed events.
    pub retry_failed_after: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(30),
            retry_failed_after: Duration::from_secs(5 * 60),
        }
    }
}

impl From<&AppConfig> for EngineOptions {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            workers: cfg.workers,
            reconnect_initial: cfg.feed.reconnect_initial,
            reconnect_max: cfg.feed.reconnect_max,
            retry_failed_after: cfg.feed.retry_failed_after,
        }
    }
}
