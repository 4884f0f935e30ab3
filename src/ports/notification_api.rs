//! NotificationApi port - Read side of the REST API used to self-heal.
//!
//! Push messages can be lost across a reconnect. Surfaces re-derive their
//! state from these calls whenever the connection (re)enters `Connected`.

use async_trait::async_trait;

use crate::domain::foundation::{Credential, DomainError};
use crate::domain::notification::Notification;

/// Port for the unread count and recent notifications.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Current unread count for the credential's subject.
    async fn unread_count(&self, credential: &Credential) -> Result<u64, DomainError>;

    /// Most recent notifications, newest first.
    async fn recent(
        &self,
        credential: &Credential,
        limit: usize,
    ) -> Result<Vec<Notification>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn NotificationApi) {}
}
