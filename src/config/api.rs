//! Portal API endpoints

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Portal API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// REST base URL, e.g. "https://lab.example.com/api"
    pub base_url: String,

    /// Path of the WebSocket endpoint under the base URL
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    /// Path of the event stream endpoint under the base URL
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// REST request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Environment name
    #[serde(default)]
    pub environment: Environment,
}

/// Application environment
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl ApiConfig {
    /// Base URL without a trailing slash
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// WebSocket URL; `http(s)` maps to `ws(s)`
    pub fn socket_url(&self) -> String {
        let base = self.base();
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}{}", base, self.socket_path)
    }

    /// Event stream URL
    pub fn stream_url(&self) -> String {
        format!("{}{}", self.base(), self.stream_path)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Validate API configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.base_url.is_empty() {
            return Err(ValidationError::MissingRequired("API__BASE_URL"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidBaseUrl(self.base_url.clone()));
        }
        if self.is_production() && !self.base_url.starts_with("https://") {
            return Err(ValidationError::BaseUrlMustBeHttps);
        }
        for path in [&self.socket_path, &self.stream_path] {
            if !path.starts_with('/') {
                return Err(ValidationError::InvalidPath(path.clone()));
            }
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout("api.request_timeout_secs"));
        }
        Ok(())
    }
}

fn default_socket_path() -> String {
    "/ws".to_string()
}

fn default_stream_path() -> String {
    "/notifications/stream".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            socket_path: default_socket_path(),
            stream_path: default_stream_path(),
            request_timeout_secs: default_request_timeout(),
            environment: Environment::Development,
        }
    }

    #[test]
    fn test_socket_url_maps_scheme() {
        assert_eq!(config("https://lab.example.com/api").socket_url(), "wss://lab.example.com/api/ws");
        assert_eq!(config("http://localhost:8080/").socket_url(), "ws://localhost:8080/ws");
    }

    #[test]
    fn test_stream_url() {
        assert_eq!(
            config("https://lab.example.com/api/").stream_url(),
            "https://lab.example.com/api/notifications/stream"
        );
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        assert!(matches!(
            config("ftp://lab").validate(),
            Err(ValidationError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_production_requires_https() {
        let mut config = config("http://lab.example.com");
        config.environment = Environment::Production;
        assert!(matches!(config.validate(), Err(ValidationError::BaseUrlMustBeHttps)));
    }

    #[test]
    fn test_relative_path_rejected() {
        let mut config = config("https://lab.example.com");
        config.socket_path = "ws".to_string();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidPath(_))));
    }
}
