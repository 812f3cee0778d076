//! Configuration management for the accessory gateway
//!
//! Loads the YAML configuration file. Every field has a sensible default
//! so a missing file just means "run with defaults".

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// WebSocket listen port for the remote controller
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Device cache file of the in-process framework; defaults to
    /// `accessories.json` in the platform data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            cache_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file; an absent file yields defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Effective device-cache path: the configured one, or
    /// `accessories.json` under the platform data directory.
    pub fn cache_path(&self) -> PathBuf {
        self.cache_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("accessory-gw")
                .join("accessories.json")
        })
    }
}

fn default_port() -> u16 {
    4050
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.port, 4050);
        assert_eq!(config.bind, "0.0.0.0");
        assert!(config.cache_path.is_none());
    }

    #[test]
    fn test_explicit_values() {
        let config: AppConfig =
            serde_yaml::from_str("port: 4051\nbind: 127.0.0.1\ncache_path: /tmp/acc.json").unwrap();
        assert_eq!(config.port, 4051);
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.cache_path(), PathBuf::from("/tmp/acc.json"));
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let config = AppConfig::load("/definitely/not/here.yaml").await.unwrap();
        assert_eq!(config.port, 4050);
    }
}
