//! Application configuration module
//!
//! Provides configuration types for the chat server. Values come from an
//! optional TOML file (named by `XFCHAT_CONFIG`) and environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Object-storage settings for media uploads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MediaConfig {
    /// Base URL objects are uploaded under
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_upload_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9000/xfchat-media".to_string(),
            api_key: None,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// HS256 secret used to sign session tokens
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    /// `None` selects the in-memory storage backend
    pub database_url: Option<String>,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub media: MediaConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            jwt_secret: "xfchat-dev-secret-change-me".to_string(),
            token_ttl_hours: 24 * 30,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            database_url: None,
            default_page_size: 20,
            max_page_size: 100,
            media: MediaConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Load configuration from `XFCHAT_CONFIG` (if set) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("XFCHAT_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("SERVER_PORT") {
            self.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT", port))?;
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Ok(url) = std::env::var("MEDIA_BASE_URL") {
            self.media.base_url = url;
        }
        if let Ok(key) = std::env::var("MEDIA_API_KEY") {
            self.media.api_key = Some(key);
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingValue("jwt_secret"));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::InvalidValue(
                "bcrypt_cost",
                self.bcrypt_cost.to_string(),
            ));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::InvalidValue(
                "default_page_size",
                self.default_page_size.to_string(),
            ));
        }
        if self.token_ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue(
                "token_ttl_hours",
                self.token_ttl_hours.to_string(),
            ));
        }
        if !self.media.base_url.starts_with("http://") && !self.media.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(self.media.base_url.clone()));
        }
        Ok(())
    }

    /// Address the server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = secret.into();
        self
    }

    pub fn token_ttl_hours(mut self, hours: i64) -> Self {
        self.config.token_ttl_hours = hours;
        self
    }

    /// Lower costs make tests fast; production should keep the default
    pub fn bcrypt_cost(mut self, cost: u32) -> Self {
        self.config.bcrypt_cost = cost;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    pub fn page_sizes(mut self, default_size: u32, max_size: u32) -> Self {
        self.config.default_page_size = default_size;
        self.config.max_page_size = max_size;
        self
    }

    pub fn media(mut self, media: MediaConfig) -> Self {
        self.config.media = media;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
    #[error("failed to read config file {0}")]
    Io(String),
    #[error("failed to parse config: {0}")]
    Parse(String),
}
