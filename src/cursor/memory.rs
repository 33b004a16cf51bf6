// src/cursor/memory.rs

use tracing::debug;

use super::{ensure_forward, CursorStore};
use crate::errors::Result;
use crate::feed::SeqToken;

/// Keeps the cursor in memory only; every process start replays the feed.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    token: SeqToken,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-known position.
    pub fn with_token(token: SeqToken) -> Self {
        Self { token }
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self) -> Result<SeqToken> {
        Ok(self.token.clone())
    }

    fn save(&mut self, token: &SeqToken) -> Result<()> {
        ensure_forward(&self.token, token)?;
        self.token = token.clone();
        debug!(seq = %token, "stored cursor (memory)");
        Ok(())
    }
}
