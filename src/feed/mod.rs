// src/feed/mod.rs

//! Change-feed model and sources.
//!
//! A feed is an ordered, resumable log of document mutations. Subscribing
//! with a `since` token yields every later change, in order, over an mpsc
//! channel. The channel closing (or an explicit [`FeedItem::Disconnected`])
//! means the subscription was lost; the engine re-subscribes from the last
//! durable cursor.
//!
//! - [`record`] parses raw change records.
//! - [`file`] follows a JSON-lines change log on disk.
//! - [`memory`] is an in-process feed with fault injection for tests.
//! - [`backoff`] computes reconnect delays.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::errors::Result;

pub mod backoff;
pub mod file;
pub mod memory;
pub mod record;

pub use backoff::Backoff;
pub use file::JsonlFileFeed;
pub use memory::MemoryFeed;
pub use record::parse_record;

/// Opaque, totally ordered change-sequence token.
///
/// Tokens are compared as plain strings and never parsed; feeds must emit
/// tokens that sort in emission order. The empty token means "start of feed"
/// and sorts before every other token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SeqToken(String);

impl SeqToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn start() -> Self {
        Self(String::new())
    }

    pub fn is_start(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeqToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_start() {
            f.write_str("<start>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for SeqToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One entry from the change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub sequence: SeqToken,
    pub document_id: String,
    /// Current full document state (`Value::Null` for bare deletions).
    pub document: Value,
    pub deleted: bool,
}

/// What a subscription delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Change(ChangeEvent),
    /// A record that could not be decoded. Skipped and reported, never fatal.
    Malformed {
        sequence: Option<SeqToken>,
        reason: String,
    },
    /// The source lost its connection; no more items follow.
    Disconnected(String),
}

/// Decides which records of a log replayed from the start a subscription
/// from `since` delivers.
///
/// A malformed record without a token is placed by the last token before it
/// in the log: it is delivered only when that token is not below `since`, so
/// resubscribing does not report the same garbage line on every resume.
#[derive(Debug, Clone)]
pub struct ResumeFilter {
    since: SeqToken,
    last: SeqToken,
}

impl ResumeFilter {
    pub fn new(since: SeqToken) -> Self {
        Self {
            since,
            last: SeqToken::start(),
        }
    }

    /// Feed records in log order.
    pub fn admits(&mut self, item: &FeedItem) -> bool {
        match item {
            FeedItem::Change(ev) => {
                self.last = ev.sequence.clone();
                ev.sequence > self.since
            }
            FeedItem::Malformed {
                sequence: Some(seq),
                ..
            } => {
                self.last = seq.clone();
                *seq > self.since
            }
            FeedItem::Malformed { sequence: None, .. } => self.last >= self.since,
            FeedItem::Disconnected(_) => true,
        }
    }
}

/// Receiving end of a subscription.
pub type FeedStream = mpsc::Receiver<FeedItem>;

/// Future returned by [`ChangeFeed::subscribe`].
pub type SubscribeFuture<'a> = Pin<Box<dyn Future<Output = Result<FeedStream>> + Send + 'a>>;

/// A resumable change-log source.
pub trait ChangeFeed: Send + Sync {
    /// Open a subscription delivering every change with `sequence > since`,
    /// in order. Calling again with a saved token resumes from that point.
    fn subscribe(&self, since: SeqToken) -> SubscribeFuture<'_>;
}

/// Capacity of the channel between a feed source and the engine.
pub const FEED_CHANNEL_CAPACITY: usize = 256;
