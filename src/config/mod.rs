//! Configuration module for tg-uploadr
//!
//! Configuration is read once at startup, either from environment variables
//! (with an optional `.env` file) or from a YAML file with `${VAR}` expansion,
//! and is immutable afterwards.

use crate::telegram::{TelegramClientConfig, TokenStatus, DEFAULT_API_BASE_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Bytes per megabyte used for the upload limit
pub const BYTES_PER_MB: u64 = 1024 * 1024;

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is read first if present;
    /// variables already set in the environment win.
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_err() {
            tracing::warn!(".env file not found");
        }
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from a variable lookup. Empty values count as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(token) = var("TELEGRAM_BOT_TOKEN") {
            config.telegram.bot_token = token.trim().to_string();
        }
        config.telegram.default_chat_id = var("DEFAULT_CHAT_ID");
        config.telegram.proxy_url = var("HTTP_PROXY").or_else(|| var("HTTPS_PROXY"));
        if let Some(base) = var("TELEGRAM_API_BASE_URL") {
            config.telegram.api_base_url = base;
        }
        if let Some(timeout) = var("REQUEST_TIMEOUT_SECS") {
            config.telegram.request_timeout_secs = timeout.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "REQUEST_TIMEOUT_SECS must be a positive integer, got '{}'",
                    timeout
                ))
            })?;
        }

        if let Some(address) = var("ADDRESS") {
            config.server.address = address;
        }
        if let Some(port) = var("PORT") {
            config.server.port = port.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("PORT must be a valid port, got '{}'", port))
            })?;
        }
        if let Some(dir) = var("STATIC_DIR") {
            config.server.static_dir = PathBuf::from(dir);
        }

        if let Some(size) = var("MAX_FILE_SIZE_MB") {
            match size.trim().parse::<u64>() {
                Ok(mb) if mb > 0 && mb.checked_mul(BYTES_PER_MB).is_some() => {
                    config.upload.max_file_size_mb = mb;
                    tracing::info!("File size limit set to {} MB", mb);
                }
                _ => tracing::warn!(
                    value = %size,
                    "Ignoring invalid MAX_FILE_SIZE_MB, keeping {} MB",
                    config.upload.max_file_size_mb
                ),
            }
        }

        if let Some(enabled) = var("METRICS_ENABLED") {
            config.metrics.enabled =
                matches!(enabled.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(port) = var("METRICS_PORT") {
            config.metrics.port = port.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "METRICS_PORT must be a valid port, got '{}'",
                    port
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// A missing bot token is not an error; the server still starts so the
    /// health endpoint can report it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "max_file_size_mb must be greater than zero".into(),
            ));
        }

        if self
            .upload
            .max_file_size_mb
            .checked_mul(BYTES_PER_MB)
            .is_none()
        {
            return Err(ConfigError::ValidationError(format!(
                "max_file_size_mb is too large: {}",
                self.upload.max_file_size_mb
            )));
        }

        if !is_valid_http_url(&self.telegram.api_base_url) {
            return Err(ConfigError::ValidationError(
                "Invalid Telegram API base URL: must start with http:// or https://".into(),
            ));
        }

        if self.telegram.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be greater than zero".into(),
            ));
        }

        if self.server.address.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Server address cannot be empty".into(),
            ));
        }

        Ok(())
    }

    /// `host:port` the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.address, self.server.port)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.upload.max_file_size_mb.saturating_mul(BYTES_PER_MB)
    }

    pub fn token_status(&self) -> TokenStatus {
        TokenStatus::of(&self.telegram.bot_token)
    }

    /// Settings for the outbound Telegram client
    pub fn telegram_client_config(&self) -> TelegramClientConfig {
        TelegramClientConfig {
            bot_token: self.telegram.bot_token.clone(),
            api_base_url: self.telegram.api_base_url.clone(),
            proxy_url: self.telegram.proxy_url.clone(),
            timeout: Some(Duration::from_secs(self.telegram.request_timeout_secs)),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding `index.html` and other landing page assets
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./public")
}

/// Telegram configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub default_chat_id: Option<String>,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            default_chat_id: None,
            proxy_url: None,
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

fn default_max_file_size_mb() -> u64 {
    20
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9090
}
