//! Errors reported by transport connectors.

use thiserror::Error;

use crate::domain::connection::ConnectionError;

/// Low-level failure from a socket or stream connector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not reach the endpoint.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The endpoint answered the upgrade/open with a non-success status.
    #[error("rejected with HTTP {status}")]
    Rejected { status: u16 },

    /// Read or write failed on an established connection.
    #[error("I/O failure: {0}")]
    Io(String),

    /// The peer closed the connection.
    #[error("closed by peer")]
    Closed,
}

impl TransportError {
    /// 401 and 403 mean the credential was refused.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, TransportError::Rejected { status: 401 | 403 })
    }
}

impl From<TransportError> for ConnectionError {
    fn from(err: TransportError) -> Self {
        if err.is_auth_rejection() {
            ConnectionError::Unauthorized(err.to_string())
        } else {
            ConnectionError::Transport(err.to_string())
        }
    }
}
