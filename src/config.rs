//! Configuration file support for eduprobe
//!
//! Reads configuration from `~/.config/eduprobe/config.json`:
//!
//! ```json
//! {
//!   "base_url": "http://localhost:8080/api",
//!   "timeout_seconds": 10,
//!   "readiness": {
//!     "probe_path": "/auth/ping",
//!     "max_attempts": 30,
//!     "interval_seconds": 2
//!   },
//!   "admin_bootstrap_credentials": {
//!     "program": "mysql",
//!     "host": "localhost",
//!     "port": 3308,
//!     "user": "root",
//!     "password": "123456",
//!     "database": "edushareqa"
//!   }
//! }
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_PROBE_PATH: &str = "/auth/ping";
const DEFAULT_MAX_ATTEMPTS: u32 = 30;
const DEFAULT_INTERVAL_SECONDS: u64 = 2;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot determine config directory. HOME environment variable not set.")]
    NoConfigDir,

    #[error("Config file {path} does not exist")]
    NotFound { path: PathBuf },

    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Readiness probe settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReadinessConfig {
    pub probe_path: String,
    pub max_attempts: u32,
    pub interval_seconds: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            probe_path: DEFAULT_PROBE_PATH.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
        }
    }
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Data store access used only by the admin bootstrap side channel
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BootstrapCredentials {
    /// Client program to run (default: `mysql`)
    pub program: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
}

impl Default for BootstrapCredentials {
    fn default() -> Self {
        Self {
            program: "mysql".to_string(),
            host: "localhost".to_string(),
            port: 3308,
            user: "root".to_string(),
            password: Some("123456".to_string()),
            database: "edushareqa".to_string(),
        }
    }
}

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Base URL every request path is joined onto
    pub base_url: String,

    /// Per-call network timeout
    pub timeout_seconds: u64,

    pub readiness: ReadinessConfig,

    pub admin_bootstrap_credentials: BootstrapCredentials,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            readiness: ReadinessConfig::default(),
            admin_bootstrap_credentials: BootstrapCredentials::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default path or return defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Config::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Returns the config file path: `~/.config/eduprobe/config.json`
pub fn config_path() -> Result<PathBuf, ConfigError> {
    // Use XDG_CONFIG_HOME if set, otherwise fall back to ~/.config
    let config_base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".config"))
                .unwrap_or_default()
        });

    if config_base.as_os_str().is_empty() {
        return Err(ConfigError::NoConfigDir);
    }

    Ok(config_base.join("eduprobe").join("config.json"))
}
