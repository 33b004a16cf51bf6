// src/errors.rs

//! Crate-wide error taxonomy and helpers.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum YggError {
    #[error("Configuration missing: {0}")]
    ConfigMissing(String),

    #[error("Configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("Failed to load handler for branch '{branch}': {reason}")]
    HandlerLoad { branch: String, reason: String },

    #[error("Ambiguous classification for document '{doc_id}': {reason}")]
    ClassificationAmbiguous { doc_id: String, reason: String },

    #[error("Handler for branch '{branch}' failed: {reason}")]
    HandlerFailure { branch: String, reason: String },

    #[error("Handler for branch '{branch}' timed out after {after:?}")]
    Timeout { branch: String, after: Duration },

    #[error("Cursor write conflict: stored '{current}', attempted '{attempted}'")]
    CursorWriteConflict { current: String, attempted: String },

    #[error("Change feed disconnected: {0}")]
    FeedDisconnected(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl YggError {
    /// Short, stable label used in structured logs and outcome counters.
    pub fn kind(&self) -> &'static str {
        match self {
            YggError::ConfigMissing(_) => "config_missing",
            YggError::ConfigInvalid(_) => "config_invalid",
            YggError::HandlerLoad { .. } => "handler_load",
            YggError::ClassificationAmbiguous { .. } => "classification_ambiguous",
            YggError::HandlerFailure { .. } => "handler_failure",
            YggError::Timeout { .. } => "timeout",
            YggError::CursorWriteConflict { .. } => "cursor_write_conflict",
            YggError::FeedDisconnected(_) => "feed_disconnected",
            YggError::IoError(_) => "io",
            YggError::TomlError(_) => "toml",
            YggError::JsonError(_) => "json",
            YggError::Other(_) => "other",
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, YggError>;
