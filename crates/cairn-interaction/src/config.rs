//! Backend endpoint configuration.
//!
//! Supports reading settings from `~/.config/cairn/backend.json`, with
//! environment-variable fallback (`CAIRN_BACKEND_URL`, `CAIRN_USER`).

use cairn_core::error::{CairnError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_USER: &str = "user";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the backend service.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend API, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Pre-established user identity forwarded with chat requests.
    #[serde(default = "default_user")]
    pub user: String,
    /// Timeout for non-streaming requests, in seconds.
    /// The chat stream itself is not subject to this timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user: default_user(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BackendConfig {
    /// Loads configuration from ~/.config/cairn/backend.json.
    ///
    /// Priority:
    /// 1. ~/.config/cairn/backend.json
    /// 2. Environment variables (CAIRN_BACKEND_URL, CAIRN_USER)
    /// 3. Built-in defaults
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the file exists but cannot be read
    /// or parsed. A missing file is not an error.
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).map_err(|e| {
                CairnError::config(format!(
                    "Failed to read configuration file at {}: {}",
                    config_path.display(),
                    e
                ))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                CairnError::config(format!(
                    "Failed to parse configuration file at {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else {
            Self::default()
        };

        if let Ok(base_url) = env::var("CAIRN_BACKEND_URL") {
            config.base_url = base_url;
        }
        if let Ok(user) = env::var("CAIRN_USER") {
            config.user = user;
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// Timeout applied to non-streaming requests.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Returns the path to the configuration file: ~/.config/cairn/backend.json
fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CairnError::config("Could not determine home directory"))?;
    Ok(home.join(".config").join("cairn").join("backend.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.user, DEFAULT_USER);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_uses_field_defaults() {
        let config: BackendConfig =
            serde_json::from_str(r#"{"base_url":"https://api.example.com"}"#).unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.user, DEFAULT_USER);
    }
}
