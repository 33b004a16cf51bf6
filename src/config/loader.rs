// src/config/loader.rs

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::model::{AppConfig, RawAppConfig};
use crate::errors::{Result, YggError};
use crate::fs::FileSystem;

/// Load the application config from `path` without semantic validation.
///
/// A present but unparsable file is `ConfigInvalid`.
pub fn load_from_path(fs: &dyn FileSystem, path: &Path) -> Result<RawAppConfig> {
    let contents = fs
        .read_to_string(path)
        .map_err(|e| YggError::ConfigMissing(format!("{}: {e:#}", path.display())))?;

    toml::from_str(&contents)
        .map_err(|e| YggError::ConfigInvalid(format!("{}: {e}", path.display())))
}

/// Load, validate and anchor relative paths at the config file's directory.
///
/// When `required` is false and the file does not exist, the built-in
/// defaults are used (anchored at the would-be config directory). When
/// `required` is true, absence is `ConfigMissing`.
pub fn load_and_validate(fs: &dyn FileSystem, path: &Path, required: bool) -> Result<AppConfig> {
    let root = config_root_dir(path);

    let raw = if fs.exists(path) {
        info!(path = %path.display(), "loading application config");
        load_from_path(fs, path)?
    } else if required {
        return Err(YggError::ConfigMissing(format!(
            "config file not found: {}",
            path.display()
        )));
    } else {
        warn!(path = %path.display(), "config file not found; using built-in defaults");
        RawAppConfig::default()
    };

    let config = AppConfig::try_from(raw)?;
    Ok(config.resolve_paths(&root))
}

/// Default config location: `Yggdrasil.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Yggdrasil.toml")
}

/// Directory that relative paths in the config are resolved against.
///
/// A bare filename (empty parent) resolves against the current directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn missing_optional_config_uses_defaults() {
        let fs = MockFileSystem::new();
        let cfg = load_and_validate(&fs, Path::new("/etc/ygg/Yggdrasil.toml"), false).unwrap();
        assert_eq!(cfg.registry_path, PathBuf::from("/etc/ygg/module_registry.toml"));
        assert_eq!(cfg.feed.path, PathBuf::from("/etc/ygg/changes.jsonl"));
    }

    #[test]
    fn missing_required_config_is_config_missing() {
        let fs = MockFileSystem::new();
        let err = load_and_validate(&fs, Path::new("/etc/ygg/Yggdrasil.toml"), true).unwrap_err();
        assert!(matches!(err, YggError::ConfigMissing(_)));
    }

    #[test]
    fn malformed_config_is_config_invalid() {
        let fs = MockFileSystem::new();
        fs.add_file("/etc/ygg/Yggdrasil.toml", "[config\nworkers = ");
        let err = load_and_validate(&fs, Path::new("/etc/ygg/Yggdrasil.toml"), false).unwrap_err();
        assert!(matches!(err, YggError::ConfigInvalid(_)));
    }

    #[test]
    fn absolute_paths_are_kept() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/etc/ygg/Yggdrasil.toml",
            "[config]\ncursor_path = \"/var/lib/ygg/seq\"\nworkers = 2\n",
        );
        let cfg = load_and_validate(&fs, Path::new("/etc/ygg/Yggdrasil.toml"), true).unwrap();
        assert_eq!(cfg.cursor_path, PathBuf::from("/var/lib/ygg/seq"));
        assert_eq!(cfg.workers, 2);
    }
}
