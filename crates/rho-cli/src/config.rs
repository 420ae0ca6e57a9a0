//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use rho_session::{PollConfig, RetryConfig, SessionConfig};

/// Configuration for rho
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL
    pub base_url: Option<String>,
    /// Bearer token (alternative to the RHO_TOKEN environment variable)
    pub token: Option<String>,
    /// Delay between index status polls, in milliseconds
    pub poll_interval_ms: Option<u64>,
    /// Failed polls retried before giving up
    pub poll_failure_retries: Option<u32>,
    /// Conversation to open on startup
    pub default_conversation: Option<i64>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rho")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("RHO_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Self::default()
            }),
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            base_url: Some(rho_api::client::DEFAULT_BASE_URL.to_string()),
            poll_interval_ms: Some(2000),
            poll_failure_retries: Some(3),
            ..Config::default()
        };

        default_config.save()?;
        Ok(path)
    }

    /// Token from config, falling back to the environment
    pub fn token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("RHO_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }

    /// Session settings derived from the poll options
    pub fn session_config(&self) -> SessionConfig {
        let mut poll = PollConfig::default();
        if let Some(ms) = self.poll_interval_ms {
            poll.interval = Duration::from_millis(ms.max(1));
        }
        if let Some(retries) = self.poll_failure_retries {
            poll.retry = RetryConfig {
                max_retries: retries,
                ..RetryConfig::default()
            };
        }

        SessionConfig {
            poll,
            ..SessionConfig::default()
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# rho configuration file
# Place at ~/.config/rho/config.toml (Linux) or set RHO_CONFIG_PATH

# Backend API base URL
base_url = "http://localhost:8000/api/v1"

# Bearer token (optional - can also use the RHO_TOKEN environment variable)
# token = "..."

# Delay between document index status checks, in milliseconds
poll_interval_ms = 2000

# How many failed status checks to retry (with backoff) before giving up.
# 0 stops polling at the first failure.
poll_failure_retries = 3

# Conversation to open on startup (optional)
# default_conversation = 1
"#
}
