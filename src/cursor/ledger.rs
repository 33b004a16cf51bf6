// src/cursor/ledger.rs

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use super::{Admission, CommitTracker, CursorStore};
use crate::errors::{Result, YggError};
use crate::feed::SeqToken;

struct LedgerState {
    tracker: CommitTracker,
    store: Box<dyn CursorStore>,
    /// Last token the store confirmed as durable.
    durable: SeqToken,
}

/// Shared commit bookkeeping: admission, completion and cursor persistence.
///
/// The store is the only writer of the cursor and is only reached through
/// this type, one save at a time.
pub struct CommitLedger {
    state: Mutex<LedgerState>,
}

impl std::fmt::Debug for CommitLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CommitLedger")
            .field("durable", &state.durable)
            .field("watermark", state.tracker.watermark())
            .finish()
    }
}

impl CommitLedger {
    /// Load the stored cursor and start tracking from it.
    pub fn open(store: Box<dyn CursorStore>) -> Result<Self> {
        let durable = store.load()?;
        info!(seq = %durable, "cursor loaded");
        Ok(Self {
            state: Mutex::new(LedgerState {
                tracker: CommitTracker::new(durable.clone()),
                store,
                durable,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Token subscriptions resume from.
    pub fn durable(&self) -> SeqToken {
        self.lock().durable.clone()
    }

    pub fn admit(&self, seq: &SeqToken) -> Admission {
        let admission = self.lock().tracker.admit(seq);
        debug!(%seq, ?admission, "admission");
        admission
    }

    /// Record that an admitted event reached a terminal outcome and persist
    /// the watermark when it moved. Returns the newly durable token, if any.
    ///
    /// A failed save leaves the durable cursor where it was; the next
    /// completion (or [`CommitLedger::flush`]) tries again.
    pub fn complete(&self, seq: &SeqToken, acked: bool) -> Result<Option<SeqToken>> {
        let mut state = self.lock();
        if !acked {
            debug!(%seq, "event failed; watermark pinned");
        }
        state.tracker.finish(seq, acked);
        persist_watermark(&mut state)
    }

    /// Persist the watermark if it is ahead of the durable cursor.
    pub fn flush(&self) -> Result<Option<SeqToken>> {
        persist_watermark(&mut self.lock())
    }

    pub fn in_flight(&self) -> usize {
        self.lock().tracker.in_flight()
    }

    /// Failed events still waiting for a retry.
    pub fn failed(&self) -> Vec<SeqToken> {
        self.lock().tracker.failed()
    }

    pub fn has_failed(&self) -> bool {
        self.lock().tracker.has_failed()
    }
}

fn persist_watermark(state: &mut LedgerState) -> Result<Option<SeqToken>> {
    let target = state.tracker.watermark().clone();
    if target <= state.durable {
        return Ok(None);
    }

    match state.store.save(&target) {
        Ok(()) => {
            debug!(seq = %target, "cursor advanced");
            state.durable = target.clone();
            Ok(Some(target))
        }
        Err(err @ YggError::CursorWriteConflict { .. }) => {
            error!(error = %err, "rejected non-monotonic cursor write");
            Err(err)
        }
        Err(err) => {
            warn!(seq = %target, error = %err, "failed to persist cursor; will retry");
            Err(err)
        }
    }
}
