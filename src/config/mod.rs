//! Run configuration: global retention settings plus the list of feeds.
//!
//! The configuration blob is JSON; files ending in `.yaml` / `.yml` are read
//! with `serde_yaml` into the same value model. A configuration that cannot
//! be read at all does not stop the run: the failure is recorded and
//! [`Config::fallback`] is used so the problem still reaches the status feed.
//!
//! # Submodules
//!
//! - [`feed`]: one configured page ([`FeedDefinition`])
//! - [`template`]: where each post field lives on that page ([`PostTemplate`])

pub mod feed;
pub mod template;

pub use feed::FeedDefinition;
pub use template::{DescriptionSpec, PostTemplate};

use crate::error::SitefeedError;
use crate::status::ErrorLog;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

pub const DEFAULT_FEED_KEEP: usize = 10;
pub const DEFAULT_STATUS_KEEP: usize = 5;

/// Parsed configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Retention of the status feed.
    pub status_keep: usize,
    /// Enables selector diagnostics.
    pub debug: bool,
    /// Successfully parsed feeds, in configuration order.
    pub feeds: Vec<FeedDefinition>,
}

fn default_feed_keep() -> usize {
    DEFAULT_FEED_KEEP
}

fn default_status_keep() -> usize {
    DEFAULT_STATUS_KEEP
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_feed_keep")]
    feed_post_keep: usize,
    #[serde(default = "default_status_keep")]
    status_post_keep: usize,
    #[serde(default)]
    debug: bool,
    feeds: Option<Vec<Value>>,
}

impl Config {
    /// Configuration used when the blob itself is unusable.
    pub fn fallback() -> Self {
        Self {
            status_keep: DEFAULT_STATUS_KEEP,
            debug: true,
            feeds: Vec::new(),
        }
    }

    /// Read and parse the configuration file at `path`.
    #[instrument(level = "info", skip(log), fields(path = %path.display()))]
    pub async fn load(path: &Path, log: &mut ErrorLog) -> Self {
        match read_value(path).await {
            Ok(value) => Self::parse(&value, log),
            Err(e) => {
                let prefix = format!("Unable to read configuration {}", path.display());
                log.record_failure(Some(&prefix), &e);
                Self::fallback()
            }
        }
    }

    /// Build a configuration from an already decoded blob.
    pub fn parse(value: &Value, log: &mut ErrorLog) -> Self {
        let raw: RawConfig = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                log.record_failure(Some("Error decoding configuration"), &SitefeedError::from(e));
                return Self::fallback();
            }
        };

        let entries = raw.feeds.unwrap_or_else(|| {
            log.record("Configuration has no <b>feeds</b> list, nothing to do");
            Vec::new()
        });
        let feeds: Vec<FeedDefinition> = entries
            .iter()
            .filter_map(|entry| FeedDefinition::parse(entry, raw.feed_post_keep, log))
            .collect();
        info!(
            configured = entries.len(),
            usable = feeds.len(),
            debug = raw.debug,
            "Parsed configuration"
        );

        Self {
            status_keep: raw.status_post_keep,
            debug: raw.debug,
            feeds,
        }
    }
}

async fn read_value(path: &Path) -> Result<Value, SitefeedError> {
    let text = fs::read_to_string(path).await?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if is_yaml {
        Ok(serde_yaml::from_str(&text)?)
    } else {
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feed(file: &str) -> Value {
        json!({
            "url": format!("https://example.com/{file}"),
            "file": file,
            "title": file,
            "description": "d",
            "post": {"title": "h1", "permalink": "a"}
        })
    }

    #[test]
    fn test_defaults_applied() {
        let mut log = ErrorLog::new();
        let config = Config::parse(&json!({"feeds": [feed("one")]}), &mut log);
        assert!(log.is_empty());
        assert_eq!(config.status_keep, 5);
        assert!(!config.debug);
        assert_eq!(config.feeds.len(), 1);
        assert_eq!(config.feeds[0].keep, 10);
    }

    #[test]
    fn test_global_keep_is_inherited() {
        let mut log = ErrorLog::new();
        let config = Config::parse(
            &json!({"feed_post_keep": 3, "status_post_keep": 2, "debug": true, "feeds": [feed("one")]}),
            &mut log,
        );
        assert_eq!(config.feeds[0].keep, 3);
        assert_eq!(config.status_keep, 2);
        assert!(config.debug);
    }

    #[test]
    fn test_bad_feed_does_not_block_others() {
        let mut broken = feed("broken");
        broken["post"] = json!({"title": "h1"});
        let mut log = ErrorLog::new();
        let config = Config::parse(&json!({"feeds": [feed("one"), broken, feed("two")]}), &mut log);
        assert_eq!(log.len(), 1);
        assert!(log.render().contains("<b>permalink</b>"));
        let files: Vec<&str> = config.feeds.iter().map(|f| f.file.as_str()).collect();
        assert_eq!(files, vec!["one", "two"]);
    }

    #[test]
    fn test_missing_feeds_list_reported() {
        let mut log = ErrorLog::new();
        let config = Config::parse(&json!({}), &mut log);
        assert!(config.feeds.is_empty());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_undecodable_config_falls_back() {
        let mut log = ErrorLog::new();
        let config = Config::parse(&json!({"debug": "yes"}), &mut log);
        assert_eq!(config, Config::fallback());
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_file_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = ErrorLog::new();
        let config = Config::load(&tmp.path().join("config.json"), &mut log).await;
        assert_eq!(config, Config::fallback());
        assert!(log.render().contains("Error encountered (Io)"));
    }

    #[tokio::test]
    async fn test_load_yaml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(
            &path,
            "feed_post_keep: 4\nfeeds:\n  - url: https://example.com\n    file: ex\n    title: Ex\n    description: d\n    post:\n      title: h1\n      permalink: a\n",
        )
        .unwrap();
        let mut log = ErrorLog::new();
        let config = Config::load(&path, &mut log).await;
        assert!(log.is_empty(), "{}", log.render());
        assert_eq!(config.feeds[0].keep, 4);
        assert_eq!(config.feeds[0].url, "https://example.com");
    }
}
