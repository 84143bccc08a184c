//! Configuration management for Toongrab.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories. The resolved [`Config`] is
//! passed into the download engine explicitly; there is no process-wide
//! mutable state.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Application name used for config directory.
const APP_NAME: &str = "Toongrab";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Default desktop browser identity for all requests.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP client settings.
    pub network: NetworkConfig,

    /// Catalog site settings.
    pub site: SiteConfig,

    /// Download pipeline settings.
    pub download: DownloadConfig,
}

/// HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds.
    pub timeout_sec: u64,

    /// Number of re-attempts after a failed request.
    pub retries: u32,

    /// Base delay between re-attempts in seconds (grows linearly).
    pub retry_delay_sec: u64,

    /// User-agent header sent with every request.
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_sec: 10,
            retries: 3,
            retry_delay_sec: 2,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Catalog site configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL of the catalog site.
    pub base_url: String,

    /// Path segment of the search endpoint under the base URL.
    pub search_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://toonily.com".to_string(),
            search_path: "search".to_string(),
        }
    }
}

/// Download pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Width of the shared worker pool bounding concurrent requests.
    pub workers: usize,

    /// Root directory chapters are downloaded into.
    pub directory: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            directory: PathBuf::from("downloads"),
        }
    }
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.timeout_sec == 0 {
            return Err(ConfigError::InvalidValue {
                key: "network.timeout_sec".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.download.workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "download.workers".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if Url::parse(&self.site.base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "site.base_url".to_string(),
                message: format!("'{}' is not a valid URL", self.site.base_url),
            });
        }

        Ok(())
    }
}
