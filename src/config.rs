//! Configuration module for Roost

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::models::TimelineId;
use crate::paths;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Timeline used when a command names none (home, local, federated, #tag, list:ID)
    #[serde(default = "default_timeline")]
    pub default_timeline: String,

    /// Number of statuses to request per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Auto-refresh interval in seconds for `watch` (0 = refresh once)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Statuses kept per timeline by `cleanup`
    #[serde(default = "default_cache_limit")]
    pub cache_limit: usize,

    /// Tracing filter used when RUST_LOG is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_timeline() -> String {
    "home".to_string()
}

fn default_page_size() -> usize {
    40
}

fn default_refresh_interval() -> u64 {
    0
}

fn default_cache_limit() -> usize {
    400
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timeline: default_timeline(),
            page_size: default_page_size(),
            refresh_interval_secs: default_refresh_interval(),
            cache_limit: default_cache_limit(),
            log_filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        paths::config_path()
    }

    /// Load config from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load config from `path`; a missing file means all defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).with_context(|| format!("Cannot read {}", path.display())),
        };
        toml::from_str(&raw).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Write config to `path`, creating missing parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let raw = toml::to_string_pretty(self)?;
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create {}", dir.display()))?,
            _ => {}
        }
        std::fs::write(path, raw).with_context(|| format!("Cannot write {}", path.display()))
    }

    /// The configured default timeline
    pub fn timeline(&self) -> Result<TimelineId> {
        TimelineId::parse(&self.default_timeline)
            .with_context(|| format!("Invalid default_timeline '{}'", self.default_timeline))
    }
}
