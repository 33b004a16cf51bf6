// src/feed/file.rs

//! JSON-lines change log follower.
//!
//! Each line of the log is one change record (see [`super::record`]). A
//! subscription reads the file from the beginning, forwards records with a
//! sequence greater than `since`, then follows appended lines. It wakes up on
//! `notify` events for the log's directory and falls back to polling every
//! `poll_interval` when no event arrives (or the watcher is unavailable).
//!
//! Sequence tokens must sort lexicographically in append order, e.g.
//! zero-padded counters.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::record::parse_record;
use super::{
    ChangeFeed, FeedItem, ResumeFilter, SeqToken, SubscribeFuture, FEED_CHANNEL_CAPACITY,
};
use crate::fs::{FileSystem, RealFileSystem};

#[derive(Debug, Clone)]
pub struct JsonlFileFeed {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    poll_interval: Duration,
    use_notify: bool,
}

impl JsonlFileFeed {
    /// Follow `path` on the real filesystem, using `notify` wake-ups.
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            fs: Arc::new(RealFileSystem),
            poll_interval,
            use_notify: true,
        }
    }

    /// Follow `path` through an arbitrary filesystem, polling only.
    pub fn with_fs(
        path: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            path: path.into(),
            fs,
            poll_interval,
            use_notify: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChangeFeed for JsonlFileFeed {
    fn subscribe(&self, since: SeqToken) -> SubscribeFuture<'_> {
        Box::pin(async move {
            let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);

            let (wake_tx, wake_rx) = mpsc::unbounded_channel::<()>();
            let watcher = if self.use_notify {
                spawn_log_watcher(&self.path, wake_tx)
            } else {
                None
            };

            info!(path = %self.path.display(), %since, "subscribing to change log");

            let follower = LogFollower {
                path: self.path.clone(),
                fs: Arc::clone(&self.fs),
                poll_interval: self.poll_interval,
                filter: ResumeFilter::new(since),
                offset: 0,
                partial: Vec::new(),
            };

            tokio::spawn(async move {
                // Keep the watcher alive for as long as the follower runs.
                let _watcher = watcher;
                follower.run(tx, wake_rx).await;
            });

            Ok(rx)
        })
    }
}

struct LogFollower {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    poll_interval: Duration,
    filter: ResumeFilter,
    offset: u64,
    partial: Vec<u8>,
}

impl LogFollower {
    async fn run(mut self, tx: mpsc::Sender<FeedItem>, mut wake_rx: mpsc::UnboundedReceiver<()>) {
        loop {
            match self.read_new_items() {
                Ok(items) => {
                    for item in items {
                        if tx.send(item).await.is_err() {
                            debug!("change log subscriber went away");
                            return;
                        }
                    }
                }
                Err(reason) => {
                    let _ = tx.send(FeedItem::Disconnected(reason)).await;
                    return;
                }
            }

            tokio::select! {
                _ = tx.closed() => return,
                // Without a watcher the sender is gone; only the poll timer wakes.
                Some(()) = wake_rx.recv() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Read whatever was appended since the last call and decode complete lines.
    fn read_new_items(&mut self) -> Result<Vec<FeedItem>, String> {
        if !self.fs.exists(&self.path) {
            if self.offset > 0 {
                return Err(format!("change log {} disappeared", self.path.display()));
            }
            return Ok(Vec::new());
        }

        let bytes = self
            .fs
            .read_from(&self.path, self.offset)
            .map_err(|e| format!("{e:#}"))?;
        self.offset += bytes.len() as u64;
        self.partial.extend_from_slice(&bytes);

        let mut items = Vec::new();
        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let item = parse_record(line);
            if self.filter.admits(&item) {
                items.push(item);
            }
        }
        Ok(items)
    }
}

/// Watch the log's directory and turn any event into a wake-up.
///
/// Returns `None` (polling only) when the platform watcher cannot be set up.
fn spawn_log_watcher(
    path: &Path,
    wake_tx: mpsc::UnboundedSender<()>,
) -> Option<RecommendedWatcher> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if res.is_ok() {
                let _ = wake_tx.send(());
            }
        },
        Config::default(),
    );

    match watcher {
        Ok(mut watcher) => match watcher.watch(&dir, RecursiveMode::NonRecursive) {
            Ok(()) => Some(watcher),
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "cannot watch change log dir; polling only");
                None
            }
        },
        Err(err) => {
            warn!(error = %err, "cannot create file watcher; polling only");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result;
    use crate::fs::mock::MockFileSystem;

    fn feed(fs: &MockFileSystem) -> JsonlFileFeed {
        JsonlFileFeed::with_fs("/data/changes.jsonl", Arc::new(fs.clone()), Duration::from_millis(10))
    }

    async fn recv(rx: &mut crate::feed::FeedStream) -> FeedItem {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for feed item")
            .expect("feed closed")
    }

    #[tokio::test]
    async fn follows_appended_lines_after_since() -> Result<()> {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/data/changes.jsonl",
            "{\"seq\":\"0001\",\"id\":\"A\",\"doc\":{}}\n{\"seq\":\"0002\",\"id\":\"B\",\"doc\":{}}\n",
        );

        let mut rx = feed(&fs).subscribe(SeqToken::new("0001")).await?;
        match recv(&mut rx).await {
            FeedItem::Change(ev) => assert_eq!(ev.document_id, "B"),
            other => panic!("unexpected {other:?}"),
        }

        // A partial line is held back until its newline arrives.
        fs.append("/data/changes.jsonl", "{\"seq\":\"0003\",\"id\":\"C\",");
        fs.append("/data/changes.jsonl", "\"doc\":{}}\n");
        match recv(&mut rx).await {
            FeedItem::Change(ev) => assert_eq!(ev.sequence, SeqToken::new("0003")),
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn bad_lines_are_reported_not_fatal() -> Result<()> {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/data/changes.jsonl",
            "garbage\n{\"seq\":\"0002\",\"id\":\"B\",\"doc\":{}}\n",
        );

        let mut rx = feed(&fs).subscribe(SeqToken::start()).await?;
        assert!(matches!(recv(&mut rx).await, FeedItem::Malformed { .. }));
        assert!(matches!(recv(&mut rx).await, FeedItem::Change(_)));
        Ok(())
    }

    #[tokio::test]
    async fn garbage_before_the_cursor_is_not_reported_again() -> Result<()> {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/data/changes.jsonl",
            "{\"seq\":\"0001\",\"id\":\"A\",\"doc\":{}}\ngarbage\n{\"seq\":\"0002\",\"id\":\"B\",\"doc\":{}}\n",
        );

        let mut rx = feed(&fs).subscribe(SeqToken::new("0002")).await?;
        fs.append("/data/changes.jsonl", "{\"seq\":\"0003\",\"id\":\"C\",\"doc\":{}}\n");
        match recv(&mut rx).await {
            FeedItem::Change(ev) => assert_eq!(ev.sequence, SeqToken::new("0003")),
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn waits_for_log_to_appear_then_reports_removal() -> Result<()> {
        let fs = MockFileSystem::new();
        let mut rx = feed(&fs).subscribe(SeqToken::start()).await?;

        fs.add_file("/data/changes.jsonl", "{\"seq\":\"0001\",\"id\":\"A\",\"doc\":{}}\n");
        assert!(matches!(recv(&mut rx).await, FeedItem::Change(_)));

        fs.remove("/data/changes.jsonl");
        assert!(matches!(recv(&mut rx).await, FeedItem::Disconnected(_)));
        Ok(())
    }
}
