// src/feed/memory.rs

//! In-process change feed.
//!
//! Holds an append-only log and serves any number of subscriptions from it.
//! Tests use it to append changes while the engine is running, to sever
//! live subscriptions, and to make the next subscribe attempts fail.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::{
    ChangeEvent, ChangeFeed, FeedItem, ResumeFilter, SeqToken, SubscribeFuture,
    FEED_CHANNEL_CAPACITY,
};
use crate::errors::YggError;

#[derive(Debug, Default)]
struct MemoryFeedState {
    log: Vec<FeedItem>,
    /// Bumped by `disconnect_all`; subscriptions from an older epoch end.
    epoch: u64,
    failing_subscribes: usize,
    subscribe_calls: Vec<SeqToken>,
}

#[derive(Debug, Clone)]
pub struct MemoryFeed {
    state: Arc<Mutex<MemoryFeedState>>,
    version: Arc<watch::Sender<u64>>,
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFeed {
    pub fn new() -> Self {
        let (version, _rx) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(MemoryFeedState::default())),
            version: Arc::new(version),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryFeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a change to the log.
    pub fn push_change(
        &self,
        sequence: impl Into<String>,
        document_id: impl Into<String>,
        document: Value,
    ) {
        self.push(FeedItem::Change(ChangeEvent {
            sequence: SeqToken::new(sequence),
            document_id: document_id.into(),
            document,
            deleted: false,
        }));
    }

    pub fn push_deletion(&self, sequence: impl Into<String>, document_id: impl Into<String>) {
        self.push(FeedItem::Change(ChangeEvent {
            sequence: SeqToken::new(sequence),
            document_id: document_id.into(),
            document: Value::Null,
            deleted: true,
        }));
    }

    /// Append a record that failed to decode.
    pub fn push_malformed(&self, sequence: Option<&str>, reason: impl Into<String>) {
        self.push(FeedItem::Malformed {
            sequence: sequence.map(SeqToken::new),
            reason: reason.into(),
        });
    }

    pub fn push(&self, item: FeedItem) {
        self.lock().log.push(item);
        self.version.send_modify(|v| *v += 1);
    }

    /// Sever every live subscription, as a dropped connection would.
    pub fn disconnect_all(&self) {
        self.lock().epoch += 1;
        self.version.send_modify(|v| *v += 1);
    }

    /// Make the next `n` subscribe attempts fail with `FeedDisconnected`.
    pub fn fail_next_subscribes(&self, n: usize) {
        self.lock().failing_subscribes = n;
    }

    /// `since` tokens of every subscribe attempt, in call order.
    pub fn subscribe_calls(&self) -> Vec<SeqToken> {
        self.lock().subscribe_calls.clone()
    }
}

impl ChangeFeed for MemoryFeed {
    fn subscribe(&self, since: SeqToken) -> SubscribeFuture<'_> {
        Box::pin(async move {
            let epoch = {
                let mut state = self.lock();
                state.subscribe_calls.push(since.clone());
                if state.failing_subscribes > 0 {
                    state.failing_subscribes -= 1;
                    return Err(YggError::FeedDisconnected(
                        "injected subscribe failure".to_string(),
                    ));
                }
                state.epoch
            };

            let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
            let state = Arc::clone(&self.state);
            let mut version_rx = self.version.subscribe();

            tokio::spawn(async move {
                let mut next_index = 0usize;
                let mut filter = ResumeFilter::new(since.clone());
                loop {
                    let batch = {
                        let state = state.lock().unwrap_or_else(PoisonError::into_inner);
                        if state.epoch != epoch {
                            debug!(%since, "memory feed subscription severed");
                            return;
                        }
                        let batch: Vec<FeedItem> = state.log[next_index..]
                            .iter()
                            .filter(|item| filter.admits(item))
                            .cloned()
                            .collect();
                        next_index = state.log.len();
                        batch
                    };

                    for item in batch {
                        if tx.send(item).await.is_err() {
                            return;
                        }
                    }

                    if version_rx.changed().await.is_err() {
                        return;
                    }
                }
            });

            Ok(rx)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn next_change(rx: &mut crate::feed::FeedStream) -> ChangeEvent {
        match rx.recv().await {
            Some(FeedItem::Change(ev)) => ev,
            other => panic!("expected change, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resumes_strictly_after_since() {
        let feed = MemoryFeed::new();
        feed.push_change("0001", "A", json!({}));
        feed.push_change("0002", "B", json!({}));
        feed.push_change("0003", "C", json!({}));

        let mut rx = feed.subscribe(SeqToken::new("0001")).await.unwrap();
        assert_eq!(next_change(&mut rx).await.sequence, SeqToken::new("0002"));
        assert_eq!(next_change(&mut rx).await.sequence, SeqToken::new("0003"));

        feed.push_change("0004", "D", json!({}));
        assert_eq!(next_change(&mut rx).await.sequence, SeqToken::new("0004"));
    }

    #[tokio::test]
    async fn disconnect_closes_live_subscriptions() {
        let feed = MemoryFeed::new();
        let mut rx = feed.subscribe(SeqToken::start()).await.unwrap();
        feed.disconnect_all();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn injected_subscribe_failures_are_consumed() {
        let feed = MemoryFeed::new();
        feed.fail_next_subscribes(1);
        assert!(feed.subscribe(SeqToken::start()).await.is_err());
        assert!(feed.subscribe(SeqToken::start()).await.is_ok());
        assert_eq!(feed.subscribe_calls().len(), 2);
    }
}
