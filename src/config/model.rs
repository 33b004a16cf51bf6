// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::CursorStorageMode;

/// Application configuration as read from `Yggdrasil.toml`.
///
/// ```toml
/// [config]
/// workers = 4
/// cursor_storage = "file"
/// cursor_path = ".ygg/last_processed_seq"
/// registry_path = "module_registry.toml"
/// default_handler_timeout = "10m"
///
/// [feed]
/// path = "changes.jsonl"
/// poll_interval = "5s"
///
/// [realm]
/// supports_auto_submit = false
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawAppConfig {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub feed: FeedSection,

    #[serde(default)]
    pub realm: RealmSection,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Size of the per-document worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub cursor_storage: CursorStorageMode,

    /// Where the durable cursor lives (for `cursor_storage = "file"`).
    #[serde(default = "default_cursor_path")]
    pub cursor_path: PathBuf,

    /// Branch registry file.
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,

    /// Handler timeout for branches that do not set their own.
    #[serde(default = "default_handler_timeout")]
    pub default_handler_timeout: String,

    /// Accept running with zero branches (health-check mode).
    #[serde(default)]
    pub allow_empty_registry: bool,
}

fn default_workers() -> usize {
    4
}

fn default_cursor_path() -> PathBuf {
    PathBuf::from(".ygg/last_processed_seq")
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("module_registry.toml")
}

fn default_handler_timeout() -> String {
    "10m".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            cursor_storage: CursorStorageMode::default(),
            cursor_path: default_cursor_path(),
            registry_path: default_registry_path(),
            default_handler_timeout: default_handler_timeout(),
            allow_empty_registry: false,
        }
    }
}

/// `[feed]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSection {
    /// JSON-lines change log to follow.
    #[serde(default = "default_feed_path")]
    pub path: PathBuf,

    /// Fallback poll interval when no filesystem notification arrives.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    #[serde(default = "default_reconnect_initial")]
    pub reconnect_initial: String,

    #[serde(default = "default_reconnect_max")]
    pub reconnect_max: String,

    /// How often failed events pinning the cursor are replayed in process.
    #[serde(default = "default_retry_failed_after")]
    pub retry_failed_after: String,
}

fn default_feed_path() -> PathBuf {
    PathBuf::from("changes.jsonl")
}

fn default_poll_interval() -> String {
    "5s".to_string()
}

fn default_reconnect_initial() -> String {
    "500ms".to_string()
}

fn default_reconnect_max() -> String {
    "30s".to_string()
}

fn default_retry_failed_after() -> String {
    "5m".to_string()
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            path: default_feed_path(),
            poll_interval: default_poll_interval(),
            reconnect_initial: default_reconnect_initial(),
            reconnect_max: default_reconnect_max(),
            retry_failed_after: default_retry_failed_after(),
        }
    }
}

/// `[realm]` section: capabilities of the processing environment.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct RealmSection {
    #[serde(default)]
    pub supports_auto_submit: bool,
}

/// Validated configuration with durations parsed and paths resolved.
///
/// Construct via `AppConfig::try_from(RawAppConfig)` or the loader.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub workers: usize,
    pub cursor_storage: CursorStorageMode,
    pub cursor_path: PathBuf,
    pub registry_path: PathBuf,
    pub default_handler_timeout: Duration,
    pub allow_empty_registry: bool,
    pub feed: FeedSettings,
    pub realm: RealmSection,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub path: PathBuf,
    pub poll_interval: Duration,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    pub retry_failed_after: Duration,
}

impl AppConfig {
    /// Re-anchor every relative path at `root` (the config file's directory).
    pub fn resolve_paths(mut self, root: &std::path::Path) -> Self {
        let anchor = |p: PathBuf| if p.is_relative() { root.join(p) } else { p };
        self.cursor_path = anchor(self.cursor_path);
        self.registry_path = anchor(self.registry_path);
        self.feed.path = anchor(self.feed.path);
        self
    }
}
