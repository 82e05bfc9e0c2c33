//! Application configuration management.
//!
//! Configuration is stored at `~/.config/partnercache/config.json`. The
//! backend URL and keys can also come from the environment
//! (`PARTNERCACHE_BACKEND_URL`, `PARTNERCACHE_ANON_KEY`,
//! `PARTNERCACHE_ACCESS_TOKEN`), which wins over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{DEFAULT_FETCH_TIMEOUT, DEFAULT_PAGE_SIZE};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "partnercache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_BACKEND_URL: &str = "PARTNERCACHE_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "PARTNERCACHE_ANON_KEY";
pub const ENV_ACCESS_TOKEN: &str = "PARTNERCACHE_ACCESS_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Could not find {0} directory")]
    NoDir(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    /// Signed-in user's token; requests fall back to the anon key without it
    pub access_token: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub cache_quota_bytes: Option<u64>,
    pub page_size: usize,
    pub fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            anon_key: None,
            access_token: None,
            cache_dir: None,
            cache_quota_bytes: None,
            page_size: DEFAULT_PAGE_SIZE,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDir("config"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Overwrite backend settings with any non-empty values from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = value(ENV_BACKEND_URL) {
            self.backend_url = Some(url);
        }
        if let Some(key) = value(ENV_ANON_KEY) {
            self.anon_key = Some(key);
        }
        if let Some(token) = value(ENV_ACCESS_TOKEN) {
            self.access_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.backend_url.as_deref().map(str::trim).unwrap_or_default();
        if url.is_empty() {
            return Err(ConfigError::Invalid("backend_url must be set"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid("backend_url must be an http(s) URL"));
        }
        if self.anon_key.as_deref().map(str::trim).unwrap_or_default().is_empty() {
            return Err(ConfigError::Invalid("anon_key must be set"));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be > 0"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch_timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn cache_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir().ok_or(ConfigError::NoDir("cache"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
