// src/cursor/mod.rs

//! Durable change-feed cursor.
//!
//! - [`CursorStore`] persists the last acknowledged sequence token
//!   ([`FileCursorStore`], [`MemoryCursorStore`]).
//! - [`CommitTracker`] turns out-of-order completions from the worker pool
//!   into a low watermark that only moves across acknowledged events.
//! - [`CommitLedger`] owns both and is what the engine and workers share.

use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::{Result, YggError};
use crate::feed::SeqToken;
use crate::fs::FileSystem;
use crate::types::CursorStorageMode;

pub mod file;
pub mod ledger;
pub mod memory;
pub mod tracker;

pub use file::FileCursorStore;
pub use ledger::CommitLedger;
pub use memory::MemoryCursorStore;
pub use tracker::{Admission, CommitTracker};

/// Storage for the single cursor value.
pub trait CursorStore: Send + Sync {
    /// Stored token, or [`SeqToken::start`] when nothing was stored yet.
    fn load(&self) -> Result<SeqToken>;

    /// Durably replace the stored token. Tokens that do not move strictly
    /// forward are rejected with [`YggError::CursorWriteConflict`].
    fn save(&mut self, token: &SeqToken) -> Result<()>;
}

/// Reject a write that does not move the cursor strictly forward.
pub fn ensure_forward(current: &SeqToken, attempted: &SeqToken) -> Result<()> {
    if attempted > current {
        Ok(())
    } else {
        Err(YggError::CursorWriteConflict {
            current: current.to_string(),
            attempted: attempted.to_string(),
        })
    }
}

/// Build the store selected by `[config].cursor_storage`.
pub fn build_cursor_store(
    mode: CursorStorageMode,
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
) -> Box<dyn CursorStore> {
    match mode {
        CursorStorageMode::File => Box::new(FileCursorStore::new(fs, path)),
        CursorStorageMode::Memory => Box::new(MemoryCursorStore::new()),
    }
}
