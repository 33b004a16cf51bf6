// src/handlers/mod.rs

//! Branch handler contract and built-in handler implementations.
//!
//! A handler is the external unit of domain logic attached to a branch. It
//! receives the already-classified document plus the branch options and
//! reports success or failure. Handlers must tolerate being invoked again
//! with the same document: delivery is at-least-once.
//!
//! - [`log`] succeeds after logging the document (registry smoke tests).
//! - [`command`] runs a shell command per document via `tokio::process`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::feed::SeqToken;
use crate::model::ProjectDocument;
use crate::policy::HpcSubmissionPolicy;
use crate::types::EventType;

pub mod command;
pub mod log;

pub use command::CommandHandler;
pub use log::LogHandler;

/// Branch options as configured in the registry.
pub type BranchOptions = Map<String, Value>;

/// Future returned by [`BranchHandler::handle`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Everything a handler gets for one invocation.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub branch: String,
    pub event_type: EventType,
    pub doc_id: String,
    pub sequence: SeqToken,
    pub document: Arc<ProjectDocument>,
    pub options: Arc<BranchOptions>,
    /// Submission policy seeded from the document, session and realm.
    /// Handlers may adjust signals before reading the decision.
    pub submission: HpcSubmissionPolicy,
}

/// Statically typed handler interface registered under a handler reference.
pub trait BranchHandler: Send + Sync {
    /// Process one document. `Ok(())` acknowledges the event.
    fn handle(&self, ctx: HandlerContext) -> HandlerFuture<'_>;
}

/// Read a string option, if present.
pub fn option_str<'a>(options: &'a BranchOptions, key: &str) -> Option<&'a str> {
    options.get(key).and_then(Value::as_str)
}
