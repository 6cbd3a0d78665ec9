//! Configuration management for mongoquery
//!
//! This module handles loading, parsing, and validating configuration:
//! - Configuration file (TOML format)
//! - Command-line overrides (applied by the CLI layer)
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Display configuration
    #[serde(default)]
    pub display: DisplayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Default MongoDB connection URI
    #[serde(default = "default_uri")]
    pub default_uri: String,

    /// Database used when the URI names none
    #[serde(default = "default_database")]
    pub database: String,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Number of retry attempts on connection failure
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Maximum pool size
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,

    /// Minimum pool size
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: u32,

    /// Connection idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,

    /// Application name reported to the server
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// Display and output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Output format (json, json-pretty)
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Enable colored output
    #[serde(default = "default_color_output")]
    pub color_output: bool,

    /// Indentation width for pretty output
    #[serde(default = "default_indent")]
    pub indent: usize,
}

/// Output format options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Compact JSON format (single-line)
    ///
    /// Example: `{"collection":"users","type":"find"}`
    Json,

    /// Pretty-printed JSON format (multi-line)
    JsonPretty,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "test".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_max_pool_size() -> u32 {
    10
}

fn default_min_pool_size() -> u32 {
    2
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_app_name() -> String {
    "mongoquery".to_string()
}

fn default_format() -> OutputFormat {
    OutputFormat::JsonPretty
}

fn default_color_output() -> bool {
    true
}

fn default_indent() -> usize {
    2
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    false
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            default_uri: default_uri(),
            database: default_database(),
            timeout: default_timeout(),
            retry_attempts: default_retry_attempts(),
            max_pool_size: default_max_pool_size(),
            min_pool_size: default_min_pool_size(),
            idle_timeout: default_idle_timeout(),
            app_name: default_app_name(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            color_output: default_color_output(),
            indent: default_indent(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded and validated configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit path, or from the default path
    ///
    /// An explicit path must exist; a missing default file yields the
    /// default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mongoquery")
            .join("config.toml")
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        self.connection.validate_uri()?;

        if self.connection.timeout == 0 {
            return Err(invalid_value("connection.timeout", "0"));
        }
        if self.connection.idle_timeout == 0 {
            return Err(invalid_value("connection.idle_timeout", "0"));
        }
        if self.connection.max_pool_size == 0 {
            return Err(invalid_value("connection.max_pool_size", "0"));
        }
        if self.connection.min_pool_size > self.connection.max_pool_size {
            return Err(invalid_value(
                "connection.min_pool_size",
                &self.connection.min_pool_size.to_string(),
            ));
        }
        if self.connection.database.is_empty() {
            return Err(invalid_value("connection.database", ""));
        }
        if self.display.format == OutputFormat::JsonPretty && self.display.indent == 0 {
            return Err(invalid_value("display.indent", "0"));
        }

        Ok(())
    }

    /// Get connection timeout as Duration
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.timeout)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.idle_timeout)
    }
}

fn invalid_value(field: &str, value: &str) -> crate::error::QueryError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl ConnectionConfig {
    /// Check that the connection URI uses a MongoDB scheme
    ///
    /// # Returns
    /// * `Result<()>` - Ok if URI is valid, error otherwise
    pub fn validate_uri(&self) -> Result<()> {
        let uri = self.default_uri.trim();
        let has_host = ["mongodb://", "mongodb+srv://"]
            .iter()
            .any(|scheme| uri.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()));

        if has_host {
            Ok(())
        } else {
            Err(invalid_value("connection.default_uri", uri))
        }
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl OutputFormat {
    /// Check if format requires pretty printing
    pub fn is_pretty(&self) -> bool {
        matches!(self, OutputFormat::JsonPretty)
    }
}
