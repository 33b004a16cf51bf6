// src/cursor/file.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing::{debug, info};

use super::{ensure_forward, CursorStore};
use crate::errors::Result;
use crate::feed::SeqToken;
use crate::fs::FileSystem;

/// Default location of the cursor file, relative to the config root.
pub const DEFAULT_CURSOR_PATH: &str = ".ygg/last_processed_seq";

/// Stores the cursor as a single line of text, replaced atomically on save.
#[derive(Debug)]
pub struct FileCursorStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self) -> Result<SeqToken> {
        if !self.fs.exists(&self.path) {
            info!(path = %self.path.display(), "no stored cursor; starting from the beginning of the feed");
            return Ok(SeqToken::start());
        }

        let content = self
            .fs
            .read_to_string(&self.path)
            .with_context(|| format!("reading cursor file {:?}", self.path))?;
        let token = content.trim();

        if token.lines().count() > 1 {
            return Err(anyhow!("cursor file {:?} holds more than one line", self.path).into());
        }

        debug!(path = %self.path.display(), seq = %token, "loaded cursor");
        Ok(SeqToken::new(token))
    }

    fn save(&mut self, token: &SeqToken) -> Result<()> {
        let current = self.load()?;
        ensure_forward(&current, token)?;

        let mut line = token.as_str().to_string();
        line.push('\n');
        self.fs
            .write_atomic(&self.path, line.as_bytes())
            .with_context(|| format!("persisting cursor {token}"))?;

        debug!(path = %self.path.display(), seq = %token, "stored cursor (file)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::YggError;
    use crate::fs::mock::MockFileSystem;

    fn store(fs: &MockFileSystem) -> FileCursorStore {
        FileCursorStore::new(Arc::new(fs.clone()), "/state/cursor")
    }

    #[test]
    fn missing_file_loads_start_token() {
        let fs = MockFileSystem::new();
        assert_eq!(store(&fs).load().unwrap(), SeqToken::start());
    }

    #[test]
    fn save_then_load_round_trips_and_rejects_backwards() {
        let fs = MockFileSystem::new();
        let mut s = store(&fs);

        s.save(&SeqToken::new("0005")).unwrap();
        assert_eq!(fs.contents("/state/cursor").as_deref(), Some("0005\n"));
        assert_eq!(store(&fs).load().unwrap(), SeqToken::new("0005"));

        let err = s.save(&SeqToken::new("0004")).unwrap_err();
        assert!(matches!(err, YggError::CursorWriteConflict { .. }));
        assert_eq!(fs.contents("/state/cursor").as_deref(), Some("0005\n"));
    }

    #[test]
    fn failed_write_is_reported() {
        let fs = MockFileSystem::new();
        fs.set_fail_writes(true);
        assert!(store(&fs).save(&SeqToken::new("0001")).is_err());
        assert!(fs.contents("/state/cursor").is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let fs = MockFileSystem::new();
        fs.add_file("/state/cursor", "0001\n0002\n");
        assert!(store(&fs).load().is_err());
    }

    #[test]
    fn real_filesystem_write_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CURSOR_PATH);
        let fs: Arc<dyn FileSystem> = Arc::new(crate::fs::RealFileSystem);

        let mut s = FileCursorStore::new(Arc::clone(&fs), &path);
        s.save(&SeqToken::new("abc")).unwrap();

        let reopened = FileCursorStore::new(fs, &path);
        assert_eq!(reopened.load().unwrap(), SeqToken::new("abc"));
    }
}
