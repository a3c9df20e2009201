// src/config/mod.rs
//! Service configuration loaded from `config/discovery.toml`.
//!
//! Every section has defaults, so a missing file yields a working (if
//! offline-ish) configuration. A file that exists but does not parse is an
//! error. Secrets never live in the file; they are read from the environment.

pub mod ai;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub use crate::config::ai::ExtractionConfig;
use crate::normalize::Calibration;

pub const DEFAULT_CONFIG_PATH: &str = "config/discovery.toml";
pub const ENV_CONFIG_PATH: &str = "DISCOVERY_CONFIG_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub sources: SourcesConfig,
    pub calibration: Calibration,
    pub extraction: ExtractionConfig,
    pub store: StoreConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Per-adapter timeout; a slower source degrades to an empty result.
    pub timeout_secs: u64,
    pub user_agent: String,
    pub arxiv_url: String,
    pub hackernews_url: String,
    pub stackexchange_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: "frontier-map/0.1".to_string(),
            arxiv_url: "http://export.arxiv.org/api/query".to_string(),
            hackernews_url: "http://hn.algolia.com/api/v1".to_string(),
            stackexchange_url: "https://api.stackexchange.com/2.3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    Memory,
    File,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub mode: StoreMode,
    /// Snapshot path for `mode = "file"`.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: StoreMode::Memory,
            path: PathBuf::from("data/backlog.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            timeout_secs: 10,
        }
    }
}

impl DiscoveryConfig {
    /// Load from `$DISCOVERY_CONFIG_PATH` or `config/discovery.toml`.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no discovery config file; using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading discovery config at {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing discovery config at {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: DiscoveryConfig = toml::from_str(s)?;
        if cfg.sources.timeout_secs == 0 {
            cfg.sources.timeout_secs = SourcesConfig::default().timeout_secs;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = DiscoveryConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.sources.timeout_secs, 10);
        assert_eq!(cfg.store.mode, StoreMode::Memory);
        assert!(!cfg.index.enabled);
        assert_eq!(cfg.calibration.news.max, 200.0);
    }

    #[test]
    fn partial_sections_override_only_given_keys() {
        let cfg = DiscoveryConfig::from_toml_str(
            r#"
[sources]
timeout_secs = 3

[calibration.qa]
min = 0.0
max = 50.0

[store]
mode = "file"
path = "/tmp/x.json"
"#,
        )
        .unwrap();
        assert_eq!(cfg.sources.timeout_secs, 3);
        assert_eq!(cfg.sources.arxiv_url, SourcesConfig::default().arxiv_url);
        assert_eq!(cfg.calibration.qa.max, 50.0);
        assert_eq!(cfg.calibration.forum.max, 100.0);
        assert_eq!(cfg.store.mode, StoreMode::File);
    }

    #[test]
    fn zero_timeout_is_reset() {
        let cfg = DiscoveryConfig::from_toml_str("[sources]\ntimeout_secs = 0\n").unwrap();
        assert_eq!(cfg.sources.timeout_secs, 10);
    }

    #[test]
    fn malformed_toml_is_rejected() {
        assert!(DiscoveryConfig::from_toml_str("[store]\nmode = 7").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = DiscoveryConfig::load_from(Path::new("/nonexistent/discovery.toml")).unwrap();
        assert_eq!(cfg.extraction.snippet_chars, 1000);
    }
}
