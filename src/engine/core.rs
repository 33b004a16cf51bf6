// src/engine/core.rs

//! Pure consumer state machine.
//!
//! [`ConsumerCore`] consumes [`ConsumerEvent`]s and returns the commands the
//! IO shell (`engine::runtime::Runtime`) should execute. It owns the
//! lifecycle state and the reconnect backoff and performs no IO, so every
//! transition is unit tested without Tokio, channels or a feed.

use tracing::{debug, warn};

use super::{ConsumerCommand, ConsumerEvent, ConsumerState, CoreStep, EngineOptions};
use crate::feed::Backoff;

#[derive(Debug)]
pub struct ConsumerCore {
    state: ConsumerState,
    backoff: Backoff,
    reconnects: u32,
}

impl ConsumerCore {
    pub fn new(options: &EngineOptions) -> Self {
        Self {
            state: ConsumerState::Idle,
            backoff: Backoff::new(options.reconnect_initial, options.reconnect_max),
            reconnects: 0,
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Subscriptions lost or refused so far.
    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    pub fn step(&mut self, event: ConsumerEvent) -> CoreStep {
        use ConsumerState as S;

        if self.state == S::Stopped {
            debug!(?event, "consumer stopped; ignoring event");
            return CoreStep {
                commands: Vec::new(),
                keep_running: false,
            };
        }

        match (self.state, event) {
            (_, ConsumerEvent::ShutdownRequested) => {
                self.state = S::Stopped;
                CoreStep {
                    commands: vec![ConsumerCommand::Stop],
                    keep_running: false,
                }
            }

            (S::Idle, ConsumerEvent::Start) | (S::Disconnected, ConsumerEvent::ReconnectDue) => {
                self.state = S::Connecting;
                CoreStep::run(vec![ConsumerCommand::Subscribe])
            }

            (S::Connecting, ConsumerEvent::Connected) => {
                self.state = S::Streaming;
                self.backoff.reset();
                CoreStep::idle()
            }

            (S::Connecting, ConsumerEvent::ConnectFailed(reason))
            | (S::Streaming, ConsumerEvent::Disconnected(reason)) => self.disconnect(reason),

            (S::Streaming, ConsumerEvent::Change(change)) => {
                CoreStep::run(vec![ConsumerCommand::Dispatch(change)])
            }

            (S::Streaming, ConsumerEvent::RetryFailedDue) => {
                debug!("replaying failed events from the durable cursor");
                self.state = S::Connecting;
                CoreStep::run(vec![ConsumerCommand::Subscribe])
            }

            (S::Streaming, ConsumerEvent::Malformed { sequence, reason }) => {
                CoreStep::run(vec![ConsumerCommand::ReportMalformed { sequence, reason }])
            }

            (state, event) => {
                debug!(?state, ?event, "event not applicable in current state");
                CoreStep::idle()
            }
        }
    }

    fn disconnect(&mut self, reason: String) -> CoreStep {
        self.state = ConsumerState::Disconnected;
        self.reconnects = self.reconnects.saturating_add(1);
        let delay = self.backoff.next_delay();
        let attempt = self.backoff.attempts();
        warn!(%reason, attempt, ?delay, "change feed unavailable; will reconnect");
        CoreStep::run(vec![ConsumerCommand::ScheduleReconnect { delay, attempt }])
    }
}
