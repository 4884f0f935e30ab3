//! Transport settings: which transport to use and how each one reconnects

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::socket::SocketManagerConfig;
use crate::adapters::stream::StreamManagerConfig;
use crate::domain::connection::{Backoff, ReconnectPolicy};

/// Which push transport the listener uses
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Persistent multiplexed socket
    #[default]
    Socket,
    /// One-directional event stream
    Stream,
}

/// Persistent socket configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SocketConfig {
    /// Prefix of per-user destinations
    #[serde(default = "default_destination_prefix")]
    pub destination_prefix: String,

    /// `host` header sent in CONNECT
    #[serde(default = "default_virtual_host")]
    pub virtual_host: String,

    /// Handshake deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Heart-beat interval in seconds (0 disables)
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Silence before the connection counts as lost, in seconds
    #[serde(default = "default_socket_idle_secs")]
    pub idle_timeout_secs: u64,

    /// First reconnect delay in milliseconds
    #[serde(default = "default_socket_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Reconnect delay cap in seconds
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Consecutive failures before giving up
    #[serde(default = "default_socket_max_attempts")]
    pub max_attempts: u32,
}

/// Event stream configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Deadline for the stream response in seconds
    #[serde(default = "default_timeout_secs")]
    pub open_timeout_secs: u64,

    /// Silence before the stream counts as broken, in seconds
    #[serde(default = "default_stream_idle_secs")]
    pub idle_timeout_secs: u64,

    /// Reconnect delay step in milliseconds
    #[serde(default = "default_stream_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Reconnect delay cap in seconds
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Consecutive failures before giving up
    #[serde(default = "default_stream_max_attempts")]
    pub max_attempts: u32,
}

impl SocketConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::for_socket()
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_secs(self.max_delay_secs))
            .with_max_attempts(self.max_attempts)
            .with_backoff(Backoff::Exponential)
    }

    /// Manager settings for the socket at `url`
    pub fn manager_config(&self, url: impl Into<String>) -> SocketManagerConfig {
        SocketManagerConfig::new(url)
            .with_destination_prefix(self.destination_prefix.clone())
            .with_virtual_host(self.virtual_host.clone())
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_heartbeat(
                Duration::from_secs(self.heartbeat_secs),
                Duration::from_secs(self.idle_timeout_secs),
            )
            .with_policy(self.policy())
    }

    /// Validate socket configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.destination_prefix.starts_with('/') {
            return Err(ValidationError::InvalidPath(self.destination_prefix.clone()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("socket.connect_timeout_secs"));
        }
        if self.heartbeat_secs > 0 && self.idle_timeout_secs <= self.heartbeat_secs {
            return Err(ValidationError::InvalidTimeout("socket.idle_timeout_secs"));
        }
        validate_policy("socket", self.max_attempts, self.max_delay_secs)
    }
}

impl StreamConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::for_stream()
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_secs(self.max_delay_secs))
            .with_max_attempts(self.max_attempts)
            .with_backoff(Backoff::Linear)
    }

    /// Manager settings for the stream at `url`
    pub fn manager_config(&self, url: impl Into<String>) -> StreamManagerConfig {
        StreamManagerConfig::new(url)
            .with_open_timeout(Duration::from_secs(self.open_timeout_secs))
            .with_idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .with_policy(self.policy())
    }

    /// Validate stream configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.open_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("stream.open_timeout_secs"));
        }
        if self.idle_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("stream.idle_timeout_secs"));
        }
        validate_policy("stream", self.max_attempts, self.max_delay_secs)
    }
}

fn validate_policy(transport: &'static str, max_attempts: u32, max_delay_secs: u64) -> Result<(), ValidationError> {
    if max_attempts == 0 || max_delay_secs == 0 {
        return Err(ValidationError::InvalidPolicy(transport));
    }
    Ok(())
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            destination_prefix: default_destination_prefix(),
            virtual_host: default_virtual_host(),
            connect_timeout_secs: default_timeout_secs(),
            heartbeat_secs: default_heartbeat_secs(),
            idle_timeout_secs: default_socket_idle_secs(),
            base_delay_ms: default_socket_base_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            max_attempts: default_socket_max_attempts(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            open_timeout_secs: default_timeout_secs(),
            idle_timeout_secs: default_stream_idle_secs(),
            base_delay_ms: default_stream_base_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            max_attempts: default_stream_max_attempts(),
        }
    }
}

fn default_destination_prefix() -> String {
    "/user".to_string()
}

fn default_virtual_host() -> String {
    "/".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_secs() -> u64 {
    10
}

fn default_socket_idle_secs() -> u64 {
    30
}

fn default_stream_idle_secs() -> u64 {
    90
}

fn default_socket_base_delay_ms() -> u64 {
    1000
}

fn default_stream_base_delay_ms() -> u64 {
    3000
}

fn default_max_delay_secs() -> u64 {
    30
}

fn default_socket_max_attempts() -> u32 {
    10
}

fn default_stream_max_attempts() -> u32 {
    5
}
