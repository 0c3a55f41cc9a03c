//! Configuration management for voxclip.
//!
//! This module provides core configuration that doesn't depend on
//! platform-specific UI libraries.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::APP_NAME;

/// Core configuration structure for the application.
///
/// This contains settings that are platform-agnostic. Platform-specific
/// settings like hotkeys are handled separately by the main application.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Endpoint that receives recordings as a multipart POST
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,

    /// Request timeout for uploads (in seconds)
    #[serde(
        default = "default_upload_timeout",
        skip_serializing_if = "is_default_upload_timeout"
    )]
    pub upload_timeout_secs: u64,

    /// How much audio the capture stream buffers before handing over a chunk
    /// (in milliseconds)
    #[serde(
        default = "default_chunk_interval",
        skip_serializing_if = "is_default_chunk_interval"
    )]
    pub chunk_interval_ms: u32,

    /// Name of the preferred input device, the host default is used when
    /// unset or not present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_device: Option<String>,

    /// Hotkey configuration (stored as string, parsed by app)
    /// Format: "modifier+modifier+key" e.g., "super+shift+KeyR"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<String>,
}

fn default_upload_timeout() -> u64 {
    30
}

fn is_default_upload_timeout(v: &u64) -> bool {
    *v == default_upload_timeout()
}

fn default_chunk_interval() -> u32 {
    1000
}

fn is_default_chunk_interval(v: &u32) -> bool {
    *v == default_chunk_interval()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_url: None,
            upload_timeout_secs: default_upload_timeout(),
            chunk_interval_ms: default_chunk_interval(),
            input_device: None,
            hotkey: None,
        }
    }
}

impl Config {
    /// Get the upload endpoint
    pub fn upload_url(&self) -> Option<&str> {
        self.upload_url.as_deref()
    }

    /// Get the upload timeout as a Duration. At least one second.
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs.max(1))
    }

    /// Get the chunk interval as a Duration. Never zero.
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.chunk_interval_ms.max(1)))
    }

    /// Get the preferred input device name
    pub fn input_device(&self) -> Option<&str> {
        self.input_device.as_deref()
    }
}

/// Manages loading and saving configuration files.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the default configuration directory.
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Creates a new ConfigManager with a specified configuration directory.
    pub fn with_config_dir<P: AsRef<std::path::Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join(format!("{}.toml", APP_NAME));
        Self { config_path }
    }

    /// Returns the default path to the configuration file.
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to retrieve configuration directory")?;
        Ok(config_dir.join(APP_NAME).join(format!("{}.toml", APP_NAME)))
    }

    /// Loads the configuration from the config file or returns default.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let config_content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file at {:?}", self.config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file at {:?}", self.config_path))?;

        if config.upload_url().is_none() {
            warn!(
                "Upload endpoint is not set. Recordings can be played back but not uploaded. \
                 Copy the config path via the tray icon to set upload_url."
            );
        }

        Ok(config)
    }

    /// Saves the configuration to the config file.
    pub fn save(&self, config: &Config) -> Result<()> {
        let config_dir = self
            .config_path
            .parent()
            .with_context(|| format!("Failed to get parent directory of {:?}", self.config_path))?;

        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory at {:?}", config_dir))?;

        let serialized =
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, serialized)
            .with_context(|| format!("Failed to write config file at {:?}", self.config_path))?;

        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &std::path::Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.upload_url.is_none());
        assert_eq!(config.upload_timeout(), Duration::from_secs(30));
        assert_eq!(config.chunk_interval(), Duration::from_millis(1000));
        assert!(config.input_device().is_none());
    }

    #[test]
    fn test_defaults_are_not_serialized() {
        let serialized = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(serialized.trim().is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            upload_url: Some("https://example.com/upload".to_string()),
            chunk_interval_ms: 250,
            ..Default::default()
        };

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.upload_url, deserialized.upload_url);
        assert_eq!(deserialized.chunk_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_chunk_interval_is_clamped() {
        let config: Config = toml::from_str("chunk_interval_ms = 0").unwrap();
        assert_eq!(config.chunk_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_zero_upload_timeout_is_clamped() {
        let config: Config = toml::from_str("upload_timeout_secs = 0").unwrap();
        assert_eq!(config.upload_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_config_dir(temp_dir.path());

        let loaded = manager.load().unwrap();
        assert!(loaded.upload_url.is_none());
        assert!(!manager.config_path().exists());
    }

    #[test]
    fn test_config_manager_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_config_dir(temp_dir.path().join("nested"));

        let config = Config {
            upload_url: Some("http://localhost:8080/upload".to_string()),
            input_device: Some("USB Microphone".to_string()),
            ..Default::default()
        };

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(config.upload_url, loaded.upload_url);
        assert_eq!(loaded.input_device(), Some("USB Microphone"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_config_dir(temp_dir.path());
        fs::write(manager.config_path(), "upload_timeout_secs = \"soon\"").unwrap();

        assert!(manager.load().is_err());
    }
}
