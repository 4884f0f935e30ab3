//! Unread-count badge.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::connection::ConnectionStatus;
use crate::domain::foundation::Credential;
use crate::domain::notification::{EventKind, NotificationEvent};
use crate::ports::{EventListener, ListenerError, NotificationApi};

use super::{spawn_on_connected, SurfaceListeners};

/// Unread count kept current from push events.
///
/// Local adjustments are optimistic; `UnreadCountUpdated` from the server
/// and the refresh on every (re)connect overwrite them.
#[derive(Debug)]
pub struct UnreadBadge {
    count: watch::Sender<u64>,
}

impl Default for UnreadBadge {
    fn default() -> Self {
        Self::new()
    }
}

impl UnreadBadge {
    pub const KINDS: [EventKind; 4] = [
        EventKind::NewNotification,
        EventKind::UnreadCountUpdated,
        EventKind::MarkedRead,
        EventKind::AllMarkedRead,
    ];

    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self { count }
    }

    pub fn count(&self) -> u64 {
        *self.count.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<u64> {
        self.count.subscribe()
    }

    pub fn set(&self, count: u64) {
        self.count.send_if_modified(|current| {
            let changed = *current != count;
            *current = count;
            changed
        });
    }

    /// Registration list for [`super::SurfaceBinding::mount`].
    pub fn listeners(self: &Arc<Self>) -> SurfaceListeners {
        Self::KINDS
            .iter()
            .map(|kind| (*kind, Arc::clone(self) as Arc<dyn EventListener>))
            .collect()
    }

    /// Re-fetches the authoritative count whenever `status` enters
    /// `Connected`.
    pub fn refresh_on_connect(
        self: &Arc<Self>,
        status: watch::Receiver<ConnectionStatus>,
        api: Arc<dyn NotificationApi>,
        credential: Credential,
    ) -> JoinHandle<()> {
        let badge = Arc::downgrade(self);
        spawn_on_connected(status, move || {
            let badge = badge.clone();
            let api = Arc::clone(&api);
            let credential = credential.clone();
            async move {
                match api.unread_count(&credential).await {
                    Ok(count) => {
                        if let Some(badge) = badge.upgrade() {
                            badge.set(count);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Unread count refresh failed"),
                }
            }
        })
    }
}

impl EventListener for UnreadBadge {
    fn on_event(&self, event: &NotificationEvent) -> Result<(), ListenerError> {
        match event {
            NotificationEvent::NewNotification(n) if n.is_unread() => {
                self.count.send_modify(|count| *count += 1);
            }
            NotificationEvent::UnreadCountUpdated(count) => self.set(*count),
            NotificationEvent::MarkedRead(_) => {
                self.count
                    .send_modify(|count| *count = count.saturating_sub(1));
            }
            NotificationEvent::AllMarkedRead => self.set(0),
            _ => {}
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "unread-badge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{DomainError, ErrorCode, NotificationId, UserId};
    use crate::domain::notification::Notification;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    fn notification(id: i64, read: bool) -> Notification {
        serde_json::from_value(json!({
            "id": id,
            "title": "Purity analysis done",
            "category": "ANALYSIS",
            "createdAt": "2025-04-02T08:30:00Z",
            "read": read
        }))
        .unwrap()
    }

    struct FixedApi(AtomicU64);

    #[async_trait]
    impl NotificationApi for FixedApi {
        async fn unread_count(&self, _: &Credential) -> Result<u64, DomainError> {
            Ok(self.0.load(Ordering::SeqCst))
        }

        async fn recent(&self, _: &Credential, _: usize) -> Result<Vec<Notification>, DomainError> {
            Err(DomainError::new(ErrorCode::InternalError, "unused"))
        }
    }

    #[test]
    fn counts_follow_events() {
        let badge = UnreadBadge::new();

        badge.on_event(&NotificationEvent::UnreadCountUpdated(4)).unwrap();
        badge.on_event(&NotificationEvent::NewNotification(notification(1, false))).unwrap();
        badge.on_event(&NotificationEvent::NewNotification(notification(2, true))).unwrap();
        assert_eq!(badge.count(), 5);

        badge.on_event(&NotificationEvent::MarkedRead(NotificationId::new(1))).unwrap();
        assert_eq!(badge.count(), 4);

        badge.on_event(&NotificationEvent::AllMarkedRead).unwrap();
        badge.on_event(&NotificationEvent::MarkedRead(NotificationId::new(2))).unwrap();
        assert_eq!(badge.count(), 0);
    }

    #[test]
    fn listeners_cover_every_count_kind() {
        let badge = Arc::new(UnreadBadge::new());
        let kinds: Vec<_> = badge.listeners().into_iter().map(|(kind, _)| kind).collect();
        assert_eq!(kinds, UnreadBadge::KINDS.to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_on_every_connect() {
        let badge = Arc::new(UnreadBadge::new());
        let api = Arc::new(FixedApi(AtomicU64::new(3)));
        let credential = Credential::new("tok", UserId::new("u1").unwrap()).unwrap();
        let (tx, rx) = watch::channel(ConnectionStatus::default());
        let connected = ConnectionStatus {
            state: crate::domain::connection::ConnectionState::Connected,
            ..Default::default()
        };

        let task = badge.refresh_on_connect(rx, api.clone(), credential);
        tx.send_replace(connected.clone());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(badge.count(), 3);

        badge.on_event(&NotificationEvent::AllMarkedRead).unwrap();
        api.0.store(9, Ordering::SeqCst);
        tx.send_replace(ConnectionStatus::default());
        tokio::time::sleep(Duration::from_millis(1)).await;
        tx.send_replace(connected);
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(badge.count(), 9);
        task.abort();
    }
}
