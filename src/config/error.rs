//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("API base URL must use HTTPS in production")]
    BaseUrlMustBeHttps,

    #[error("Endpoint path must start with '/': {0}")]
    InvalidPath(String),

    #[error("Invalid timeout for {0}")]
    InvalidTimeout(&'static str),

    #[error("Invalid reconnect policy for {0}")]
    InvalidPolicy(&'static str),

    #[error("Invalid bearer token: {0}")]
    InvalidToken(String),

    #[error("Invalid log filter: {0}")]
    InvalidLogFilter(String),
}
