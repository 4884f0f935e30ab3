//! Connection failure taxonomy.

use std::time::Duration;

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Why a connection is not (or no longer) established.
///
/// Expected failures are reported through [`super::ConnectionStatus`]
/// rather than raised, except for the result of an explicit `connect()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The server refused the credential during the handshake.
    #[error("credential rejected: {0}")]
    Unauthorized(String),

    /// Network or socket level failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Handshake or liveness deadline passed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The peer sent something the client cannot interpret at the framing level.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// `connect()` while connected under another credential.
    #[error("already connected with a different credential")]
    CredentialChanged,

    /// `disconnect()` raced an in-flight connect.
    #[error("connection attempt cancelled")]
    Cancelled,

    /// The reconnection policy gave up.
    #[error("gave up after {attempts} failed attempts")]
    RetriesExhausted { attempts: u32 },
}

impl ConnectionError {
    /// Whether the reconnection policy should schedule another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConnectionError::Transport(_) | ConnectionError::Timeout(_) | ConnectionError::Protocol(_)
        )
    }

    /// Whether the UI should offer a manual reconnect.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionError::Unauthorized(_) | ConnectionError::RetriesExhausted { .. }
        )
    }

    /// Error code for the crate-wide error type.
    pub fn code(&self) -> ErrorCode {
        match self {
            ConnectionError::Unauthorized(_) => ErrorCode::Unauthorized,
            ConnectionError::Timeout(_) => ErrorCode::Timeout,
            ConnectionError::RetriesExhausted { .. } => ErrorCode::RetriesExhausted,
            ConnectionError::CredentialChanged => ErrorCode::ValidationFailed,
            ConnectionError::Transport(_)
            | ConnectionError::Protocol(_)
            | ConnectionError::Cancelled => ErrorCode::ConnectionFailed,
        }
    }
}

impl From<ConnectionError> for DomainError {
    fn from(err: ConnectionError) -> Self {
        DomainError::new(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_are_retryable() {
        assert!(ConnectionError::Transport("reset".into()).is_retryable());
        assert!(ConnectionError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!ConnectionError::Unauthorized("expired".into()).is_retryable());
        assert!(!ConnectionError::Cancelled.is_retryable());
    }

    #[test]
    fn terminal_failures_offer_reconnect() {
        assert!(ConnectionError::RetriesExhausted { attempts: 5 }.is_terminal());
        assert!(ConnectionError::Unauthorized("expired".into()).is_terminal());
        assert!(!ConnectionError::Transport("reset".into()).is_terminal());
    }

    #[test]
    fn converts_to_domain_error_with_code() {
        let err: DomainError = ConnectionError::RetriesExhausted { attempts: 3 }.into();
        assert_eq!(err.code, ErrorCode::RetriesExhausted);
        assert!(err.message.contains('3'));
    }
}
