// src/dispatch/mod.rs

//! Event dispatch.
//!
//! [`Dispatcher::dispatch`] takes one change event through deletion
//! relevance, trigger classification, branch lookup, handler resolution and
//! a time-limited handler invocation, producing an [`Outcome`].
//! [`WorkerPool`] runs dispatches concurrently across documents while keeping
//! each document's events in order.

pub mod classify;
pub mod dispatcher;
pub mod outcome;
pub mod pool;

pub use classify::{classify, Classification};
pub use dispatcher::{DispatchSettings, Dispatcher, DEFAULT_HANDLER_TIMEOUT};
pub use outcome::{Outcome, OutcomeCounters, OutcomeReport, OutcomeTotals, SkipReason};
pub use pool::{shard_for, WorkerPool};
