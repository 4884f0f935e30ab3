//! ConnectionManager port - Lifecycle contract shared by both transports.
//!
//! ## State machine
//!
//! ```text
//! Disconnected --connect()--> Connecting --ok--> Connected
//!      ^                          |                 |
//!      |                       failure        close/error
//!      |                          v                 v
//!      +------ retry timer ---- Disconnected (retry per policy)
//!
//! disconnect() from any state --> Disconnected, no retry
//! ```

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::connection::{ConnectionError, ConnectionStatus};
use crate::domain::foundation::Credential;

/// Port for one push connection.
///
/// Implementations own their state exclusively; everything else observes it
/// through `is_connected`, `status` and `watch_status`.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Connect with `credential`. A no-op when already connected with it.
    ///
    /// Transient failures are returned and also hand the connection to the
    /// reconnection policy; an `Unauthorized` result is final.
    async fn connect(&self, credential: &Credential) -> Result<(), ConnectionError>;

    /// Close the connection and cancel any pending retry. Idempotent.
    async fn disconnect(&self);

    /// Whether the transport is currently connected.
    fn is_connected(&self) -> bool;

    /// Current status snapshot.
    fn status(&self) -> ConnectionStatus;

    /// Receiver updated on every status change.
    fn watch_status(&self) -> watch::Receiver<ConnectionStatus>;

    /// Transport name for logs.
    fn transport(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn ConnectionManager) {}
}
