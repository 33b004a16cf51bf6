// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{AppConfig, FeedSettings, RawAppConfig};
use crate::errors::{Result, YggError};
use crate::types::parse_duration;

impl TryFrom<RawAppConfig> for AppConfig {
    type Error = YggError;

    fn try_from(raw: RawAppConfig) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;

        let feed = FeedSettings {
            path: raw.feed.path,
            poll_interval: duration_field("feed.poll_interval", &raw.feed.poll_interval)?,
            reconnect_initial: duration_field(
                "feed.reconnect_initial",
                &raw.feed.reconnect_initial,
            )?,
            reconnect_max: duration_field("feed.reconnect_max", &raw.feed.reconnect_max)?,
            retry_failed_after: duration_field(
                "feed.retry_failed_after",
                &raw.feed.retry_failed_after,
            )?,
        };

        Ok(AppConfig {
            workers: raw.config.workers,
            cursor_storage: raw.config.cursor_storage,
            cursor_path: raw.config.cursor_path,
            registry_path: raw.config.registry_path,
            default_handler_timeout: duration_field(
                "config.default_handler_timeout",
                &raw.config.default_handler_timeout,
            )?,
            allow_empty_registry: raw.config.allow_empty_registry,
            feed,
            realm: raw.realm,
        })
    }
}

/// Semantic checks that `serde` cannot express.
pub fn validate_config(cfg: &RawAppConfig) -> Result<()> {
    validate_global_config(cfg)?;
    validate_feed_config(cfg)?;
    Ok(())
}

fn validate_global_config(cfg: &RawAppConfig) -> Result<()> {
    if cfg.config.workers == 0 {
        return Err(YggError::ConfigInvalid(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }

    let timeout = duration_field(
        "config.default_handler_timeout",
        &cfg.config.default_handler_timeout,
    )?;
    if timeout.is_zero() {
        return Err(YggError::ConfigInvalid(
            "[config].default_handler_timeout must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_feed_config(cfg: &RawAppConfig) -> Result<()> {
    duration_field("feed.poll_interval", &cfg.feed.poll_interval)?;
    let initial = duration_field("feed.reconnect_initial", &cfg.feed.reconnect_initial)?;
    let max = duration_field("feed.reconnect_max", &cfg.feed.reconnect_max)?;

    if initial > max {
        return Err(YggError::ConfigInvalid(format!(
            "[feed].reconnect_initial ({}) must not exceed reconnect_max ({})",
            cfg.feed.reconnect_initial, cfg.feed.reconnect_max
        )));
    }

    let retry = duration_field("feed.retry_failed_after", &cfg.feed.retry_failed_after)?;
    if retry.is_zero() {
        return Err(YggError::ConfigInvalid(
            "[feed].retry_failed_after must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn duration_field(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|e| YggError::ConfigInvalid(format!("invalid duration for {field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<AppConfig> {
        let raw: RawAppConfig = toml::from_str(toml_src)?;
        AppConfig::try_from(raw)
    }

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.default_handler_timeout, Duration::from_secs(600));
        assert_eq!(cfg.feed.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.feed.retry_failed_after, Duration::from_secs(300));
        assert!(!cfg.realm.supports_auto_submit);
    }

    #[test]
    fn zero_workers_is_invalid() {
        let err = parse("[config]\nworkers = 0\n").unwrap_err();
        assert!(matches!(err, YggError::ConfigInvalid(msg) if msg.contains("workers")));
    }

    #[test]
    fn bad_duration_is_invalid() {
        let err = parse("[feed]\npoll_interval = \"soon\"\n").unwrap_err();
        assert!(matches!(err, YggError::ConfigInvalid(msg) if msg.contains("poll_interval")));
    }

    #[test]
    fn reconnect_bounds_are_checked() {
        let err = parse("[feed]\nreconnect_initial = \"1m\"\nreconnect_max = \"1s\"\n").unwrap_err();
        assert!(matches!(err, YggError::ConfigInvalid(_)));
    }

    #[test]
    fn zero_retry_period_is_invalid() {
        let err = parse("[feed]\nretry_failed_after = \"0s\"\n").unwrap_err();
        assert!(matches!(err, YggError::ConfigInvalid(msg) if msg.contains("retry_failed_after")));
    }
}
