//! Configuration management for Lex.
//!
//! Loads configuration from ${LEX_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Path helpers for the Lex home directory.
pub mod paths {
    use std::path::PathBuf;

    /// Returns the Lex home directory.
    ///
    /// Uses `LEX_HOME` if set, otherwise `~/.lex`.
    ///
    /// # Panics
    /// Panics if neither `LEX_HOME` nor `HOME` can be determined.
    pub fn lex_home() -> PathBuf {
        if let Ok(home) = std::env::var("LEX_HOME")
            && !home.trim().is_empty()
        {
            return PathBuf::from(home);
        }
        home_dir()
            .map(|home| home.join(".lex"))
            .expect("Could not determine home directory")
    }

    /// Returns the user's home directory, if known.
    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME").map(PathBuf::from)
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        lex_home().join("config.toml")
    }

    /// Returns the path to the log directory.
    pub fn logs_dir() -> PathBuf {
        lex_home().join("logs")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the assistant backend
    pub backend_url: String,

    /// Abort a turn when no bytes arrive for this many seconds (0 disables)
    pub idle_timeout_secs: u32,

    /// Default log level when RUST_LOG is not set
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: Self::DEFAULT_BACKEND_URL.to_string(),
            idle_timeout_secs: Self::DEFAULT_IDLE_TIMEOUT_SECS,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
    const DEFAULT_IDLE_TIMEOUT_SECS: u32 = 120;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Resolves the backend base URL with precedence: env > config.
    ///
    /// # Errors
    /// Returns an error if the resolved value is not a valid URL.
    pub fn effective_backend_url(&self) -> Result<String> {
        if let Ok(env_url) = std::env::var("LEX_BACKEND_URL") {
            let trimmed = env_url.trim();
            if !trimmed.is_empty() {
                validate_url(trimmed)?;
                return Ok(trimmed.to_string());
            }
        }

        let trimmed = self.backend_url.trim();
        validate_url(trimmed)?;
        Ok(trimmed.to_string())
    }

    /// Returns the idle-read timeout, or `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.idle_timeout_secs)))
        }
    }
}

fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid backend URL: {url}"))?;
    Ok(())
}
