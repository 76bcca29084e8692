//! Configuration for twinbox clients
//!
//! Stored as TOML. Default location:
//!
//! - Unix: `~/.config/twinbox/twinbox.toml`
//! - Windows: `%APPDATA%\twinbox\twinbox.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use twinbox_crypto::asymmetric::{DEFAULT_MODULUS_BITS, MIN_GENERATED_MODULUS_BITS};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Client configuration
///
/// # Example TOML
///
/// ```toml
/// [identity]
/// key_bits = 4096
///
/// [directory]
/// base_url = "http://localhost:3000"
/// timeout_seconds = 10
/// max_retries = 3
/// initial_backoff_ms = 200
/// max_backoff_ms = 5000
///
/// [logging]
/// level = "warn"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Path to the identity file (empty = default location)
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// Modulus size for newly generated identities
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,
}

fn default_key_bits() -> usize {
    DEFAULT_MODULUS_BITS
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            key_path: None,
            key_bits: default_key_bits(),
        }
    }
}

impl IdentityConfig {
    /// Configured identity file, or `<data_dir>/identity.json`.
    pub fn resolved_key_path(&self) -> PathBuf {
        self.key_path.clone().unwrap_or_else(|| {
            Config::data_dir()
                .map(|dir| dir.join("identity.json"))
                .unwrap_or_else(|| PathBuf::from("identity.json"))
        })
    }
}

/// Key directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Base URL of the chat server exposing `/api/publickey`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Session cookie sent with directory requests, e.g. `connect.sid=...`
    #[serde(default)]
    pub session_cookie: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            session_cookie: None,
        }
    }
}

impl DirectoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from custom path or default
    pub fn load_from(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        match custom_path {
            Some(path) => Self::load(path),
            None => Self::load_default(),
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("io", "twinbox", "twinbox")
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("twinbox.toml"))
    }

    /// Data directory (identity file lives here by default)
    pub fn data_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create default configuration file if it doesn't exist
    pub fn create_default_if_missing() -> Result<bool, ConfigError> {
        if let Some(path) = Self::default_path() {
            if !path.exists() {
                Self::default().save(&path)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.key_bits < MIN_GENERATED_MODULUS_BITS {
            return Err(ConfigError::ValidationError(format!(
                "key_bits must be at least {MIN_GENERATED_MODULUS_BITS}, got {}",
                self.identity.key_bits
            )));
        }

        if self.directory.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.directory.max_backoff_ms == 0 {
            return Err(ConfigError::ValidationError(
                "max_backoff_ms must be greater than 0".to_string(),
            ));
        }

        if self.directory.max_backoff_ms < self.directory.initial_backoff_ms {
            return Err(ConfigError::ValidationError(format!(
                "max_backoff_ms ({}) must not be less than initial_backoff_ms ({})",
                self.directory.max_backoff_ms, self.directory.initial_backoff_ms
            )));
        }

        let url = &self.directory.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "Invalid directory base_url '{url}': must start with http:// or https://"
            )));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Valid values: {:?}",
                self.logging.level, valid_levels
            )));
        }

        Ok(())
    }
}

/// CLI overrides; set fields take precedence over file values.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub directory_url: Option<String>,
    pub key_path: Option<PathBuf>,
    pub session_cookie: Option<String>,
    pub verbose: Option<bool>,
    pub debug: Option<bool>,
}

impl Config {
    /// Apply CLI overrides to configuration
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(ref url) = overrides.directory_url {
            self.directory.base_url = url.clone();
        }
        if let Some(ref path) = overrides.key_path {
            self.identity.key_path = Some(path.clone());
        }
        if let Some(ref cookie) = overrides.session_cookie {
            self.directory.session_cookie = Some(cookie.clone());
        }
        if overrides.verbose == Some(true) {
            self.logging.level = "info".to_string();
        }
        if overrides.debug == Some(true) {
            self.logging.level = "debug".to_string();
        }
        self
    }
}
