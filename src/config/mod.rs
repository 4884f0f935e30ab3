//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `SEEDLAB_` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use seedlab_notify::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Socket endpoint: {}", config.api.socket_url());
//! ```

mod api;
mod auth;
mod error;
mod logging;
mod transport;

pub use api::{ApiConfig, Environment};
pub use auth::AuthConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::{LogFormat, LoggingConfig};
pub use transport::{SocketConfig, StreamConfig, TransportKind};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Portal endpoints
    pub api: ApiConfig,

    /// Listener credential
    #[serde(default)]
    pub auth: AuthConfig,

    /// Persistent socket settings
    #[serde(default)]
    pub socket: SocketConfig,

    /// Event stream settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// Log filter and format
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Which transport to use
    #[serde(default)]
    pub transport: TransportKind,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `SEEDLAB` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `SEEDLAB__API__BASE_URL=https://lab.example.com/api` -> `api.base_url`
    /// - `SEEDLAB__SOCKET__MAX_ATTEMPTS=5` -> `socket.max_attempts = 5`
    /// - `SEEDLAB__TRANSPORT=stream` -> `transport = Stream`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SEEDLAB")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.api.validate()?;
        self.auth.validate()?;
        self.socket.validate()?;
        self.stream.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.api.is_production()
    }
}
