// src/config/mod.rs

//! Application configuration for yggdrasil.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file through the [`FileSystem`](crate::fs::FileSystem)
//!   abstraction (`loader.rs`).
//! - Validate invariants `serde` cannot express (`validate.rs`).
//!
//! The branch registry has its own file and loader in [`crate::registry`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, default_config_path, load_and_validate, load_from_path};
pub use model::{AppConfig, ConfigSection, FeedSection, FeedSettings, RawAppConfig, RealmSection};
pub use validate::validate_config;
