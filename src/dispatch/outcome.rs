// src/dispatch/outcome.rs

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::YggError;
use crate::feed::SeqToken;

/// Why an event was acknowledged without invoking a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Deletion for a branch that does not handle deletions.
    Deleted,
    /// The record or document could not be decoded.
    Malformed(String),
    /// No branch is declared, or the declared one is not registered.
    UnknownBranch,
    /// More than one trigger applies to the document; carries the
    /// `ClassificationAmbiguous` error message.
    AmbiguousClassification(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Deleted => f.write_str("deletion not handled"),
            SkipReason::Malformed(reason) => write!(f, "malformed event: {reason}"),
            SkipReason::UnknownBranch => f.write_str("unknown branch"),
            SkipReason::AmbiguousClassification(reason) => f.write_str(reason),
        }
    }
}

/// Terminal result of dispatching one event.
#[derive(Debug)]
pub enum Outcome {
    Handled,
    Skipped(SkipReason),
    Failed(YggError),
}

impl Outcome {
    /// Handled and skipped events move the cursor; failures do not.
    pub fn is_acknowledged(&self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Handled => "handled",
            Outcome::Skipped(_) => "skipped",
            Outcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Handled => f.write_str("handled"),
            Outcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            Outcome::Failed(err) => write!(f, "failed ({err})"),
        }
    }
}

/// Outcome of one event as seen by observers of the worker pool.
#[derive(Debug)]
pub struct OutcomeReport {
    pub sequence: SeqToken,
    pub document_id: String,
    pub outcome: Outcome,
}

/// Process-wide outcome counters.
#[derive(Debug, Default)]
pub struct OutcomeCounters {
    handled: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`OutcomeCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTotals {
    pub handled: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl OutcomeCounters {
    pub fn record(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Handled => &self.handled,
            Outcome::Skipped(_) => &self.skipped,
            Outcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn totals(&self) -> OutcomeTotals {
        OutcomeTotals {
            handled: self.handled.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl OutcomeTotals {
    pub fn total(&self) -> u64 {
        self.handled + self.skipped + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_failures_are_unacknowledged() {
        assert!(Outcome::Handled.is_acknowledged());
        assert!(Outcome::Skipped(SkipReason::UnknownBranch).is_acknowledged());
        assert!(!Outcome::Failed(YggError::FeedDisconnected("x".into())).is_acknowledged());
    }

    #[test]
    fn unknown_branch_reads_naturally() {
        assert_eq!(SkipReason::UnknownBranch.to_string(), "unknown branch");
    }

    #[test]
    fn counters_track_each_kind() {
        let c = OutcomeCounters::default();
        c.record(&Outcome::Handled);
        c.record(&Outcome::Handled);
        c.record(&Outcome::Skipped(SkipReason::Deleted));
        assert_eq!(
            c.totals(),
            OutcomeTotals {
                handled: 2,
                skipped: 1,
                failed: 0
            }
        );
        assert_eq!(c.totals().total(), 3);
    }
}
