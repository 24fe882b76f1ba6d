//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, session timing and the last email used
//! to sign in.
//!
//! Configuration is stored at `~/.config/folio-admin/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::SessionConfig;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "folio-admin";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "FOLIO_API_URL";

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_INACTIVITY_TIMEOUT_MINUTES: u64 = 30;
const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Upper bound for a configured idle timeout (one week)
const MAX_INACTIVITY_TIMEOUT_MINUTES: u64 = 7 * 24 * 60;

/// Where the session token and expiration are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub inactivity_timeout_minutes: u64,
    pub debounce_ms: u64,
    pub store: StoreBackend,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            inactivity_timeout_minutes: DEFAULT_INACTIVITY_TIMEOUT_MINUTES,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            store: StoreBackend::default(),
            last_email: None,
        }
    }
}

impl Config {
    /// Load from disk, then apply `FOLIO_API_URL` if set.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env(std::env::var(API_URL_ENV).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self, api_url: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
        // Trailing slash would double up when joining endpoint paths
        while self.api_base_url.ends_with('/') {
            self.api_base_url.pop();
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            inactivity_timeout: Duration::from_secs(
                self.inactivity_timeout_minutes
                    .clamp(1, MAX_INACTIVITY_TIMEOUT_MINUTES)
                    .saturating_mul(60),
            ),
            debounce_delay: Duration::from_millis(self.debounce_ms),
            ..SessionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_session_defaults() {
        let session = Config::default().session_config();
        assert_eq!(session.inactivity_timeout, Duration::from_secs(30 * 60));
        assert_eq!(session.debounce_delay, Duration::from_millis(500));
        assert_eq!(session.token_key, "token");
        assert_eq!(session.expiration_key, "tokenExpiration");
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"store": "keyring"}"#).unwrap();
        assert_eq!(config.store, StoreBackend::Keyring);
        assert_eq!(config.inactivity_timeout_minutes, 30);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_env_override_and_trailing_slash() {
        let mut config = Config::default();
        config.apply_env(Some("https://api.example.com/".to_string()));
        assert_eq!(config.api_base_url, "https://api.example.com");

        // Blank values are ignored
        config.apply_env(Some("  ".to_string()));
        assert_eq!(config.api_base_url, "https://api.example.com");
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let config = Config {
            inactivity_timeout_minutes: 0,
            ..Config::default()
        };
        assert_eq!(config.session_config().inactivity_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_huge_timeout_is_clamped() {
        let config = Config {
            inactivity_timeout_minutes: u64::MAX,
            ..Config::default()
        };
        assert_eq!(
            config.session_config().inactivity_timeout,
            Duration::from_secs(MAX_INACTIVITY_TIMEOUT_MINUTES * 60)
        );
    }
}
