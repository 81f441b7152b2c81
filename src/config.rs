//! Configuration file support for devpulse
//!
//! Reads from .devpulse/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Port for `devpulse serve`
    /// Default: 8700
    #[serde(default = "default_port")]
    pub port: u16,

    /// Static API key required on ingestion requests. Generated by
    /// `devpulse init`; the DEVPULSE_API_KEY env var takes priority.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_port() -> u16 {
    8700
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            api_key: None,
        }
    }
}

impl Config {
    /// Load config from .devpulse/config.toml
    /// Returns default config if file doesn't exist
    pub fn load() -> Self {
        if let Some(path) = Self::find_config_path() {
            if let Ok(contents) = std::fs::read_to_string(&path) {
                if let Ok(config) = toml::from_str(&contents) {
                    return config;
                }
            }
        }
        Self::default()
    }

    /// Find config.toml by walking up directory tree
    pub fn find_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut dir = current_dir.as_path();

        loop {
            let config_path = dir.join(".devpulse").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        None
    }

    /// Effective API key: env var first, then config file.
    pub fn api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("DEVPULSE_API_KEY") {
            if !key.is_empty() {
                return Some(key);
            }
        }
        self.server.api_key.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8700);
        assert!(config.server.api_key.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
port = 9100
api_key = "k-123"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.api_key.as_deref(), Some("k-123"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8700);
    }
}
