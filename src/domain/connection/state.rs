//! Connection lifecycle state as observed from outside a manager.

use std::fmt;

use super::ConnectionError;

/// Lifecycle state owned by a connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// Returns true if the connection is active.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Read-only snapshot published by a manager on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Consecutive failures since the last successful connect.
    pub attempts: u32,
    /// Last failure, cleared on successful connect.
    pub error: Option<ConnectionError>,
    /// A reconnect timer is armed.
    pub retry_pending: bool,
}

impl ConnectionStatus {
    /// Returns true if the connection is active.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// The reconnection policy gave up.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.error, Some(ConnectionError::RetriesExhausted { .. }))
    }

    /// Nothing will happen without an explicit `connect()`.
    pub fn is_terminal(&self) -> bool {
        self.state == ConnectionState::Disconnected
            && self.error.as_ref().is_some_and(ConnectionError::is_terminal)
    }

    /// Disconnected with no retry armed: never connected, given up or rejected.
    pub fn is_idle(&self) -> bool {
        self.state == ConnectionState::Disconnected && !self.retry_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_idle_disconnected() {
        let status = ConnectionStatus::default();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert!(!status.is_connected());
        assert!(!status.is_terminal());
    }

    #[test]
    fn exhausted_status_is_terminal() {
        let status = ConnectionStatus {
            attempts: 5,
            error: Some(ConnectionError::RetriesExhausted { attempts: 5 }),
            ..Default::default()
        };
        assert!(status.is_exhausted());
        assert!(status.is_terminal());
    }

    #[test]
    fn retrying_status_is_not_terminal() {
        let status = ConnectionStatus {
            attempts: 2,
            error: Some(ConnectionError::Transport("reset".into())),
            retry_pending: true,
            ..Default::default()
        };
        assert!(!status.is_terminal());
        assert!(!status.is_idle());
    }

    #[test]
    fn idle_covers_fresh_and_terminal_status() {
        assert!(ConnectionStatus::default().is_idle());
        let rejected = ConnectionStatus {
            error: Some(ConnectionError::Unauthorized("expired".into())),
            ..Default::default()
        };
        assert!(rejected.is_idle());
        let connected = ConnectionStatus {
            state: ConnectionState::Connected,
            ..Default::default()
        };
        assert!(!connected.is_idle());
    }

    #[test]
    fn state_display_is_lowercase() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }
}
