//! Most-recent-first notification list.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::connection::ConnectionStatus;
use crate::domain::foundation::{Credential, NotificationId};
use crate::domain::notification::{EventKind, Notification, NotificationEvent};
use crate::ports::{EventListener, ListenerError, NotificationApi};

use super::{spawn_on_connected, SurfaceListeners};

/// Bounded feed, newest first, deduplicated by id.
#[derive(Debug)]
pub struct NotificationFeed {
    capacity: usize,
    items: Mutex<VecDeque<Notification>>,
}

impl NotificationFeed {
    pub const KINDS: [EventKind; 4] = [
        EventKind::NewNotification,
        EventKind::MarkedRead,
        EventKind::AllMarkedRead,
        EventKind::Deleted,
    ];

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the current list.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn unread(&self) -> usize {
        self.lock().iter().filter(|n| n.is_unread()).count()
    }

    /// Replaces the list with a server snapshot, newest first.
    pub fn replace(&self, mut items: Vec<Notification>) {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut seen = std::collections::HashSet::new();
        items.retain(|n| seen.insert(n.id));
        items.truncate(self.capacity);
        *self.lock() = items.into();
    }

    pub fn listeners(self: &Arc<Self>) -> SurfaceListeners {
        Self::KINDS
            .iter()
            .map(|kind| (*kind, Arc::clone(self) as Arc<dyn EventListener>))
            .collect()
    }

    /// Reloads the feed from the API whenever `status` enters `Connected`.
    pub fn refresh_on_connect(
        self: &Arc<Self>,
        status: watch::Receiver<ConnectionStatus>,
        api: Arc<dyn NotificationApi>,
        credential: Credential,
    ) -> JoinHandle<()> {
        let feed = Arc::downgrade(self);
        let limit = self.capacity;
        spawn_on_connected(status, move || {
            let feed = feed.clone();
            let api = Arc::clone(&api);
            let credential = credential.clone();
            async move {
                match api.recent(&credential, limit).await {
                    Ok(items) => {
                        if let Some(feed) = feed.upgrade() {
                            feed.replace(items);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Notification feed refresh failed"),
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, notification: &Notification) {
        let mut items = self.lock();
        items.retain(|n| n.id != notification.id);
        items.push_front(notification.clone());
        items.truncate(self.capacity);
    }

    fn mark_read(&self, id: NotificationId) {
        if let Some(n) = self.lock().iter_mut().find(|n| n.id == id) {
            n.read = true;
        }
    }
}

impl EventListener for NotificationFeed {
    fn on_event(&self, event: &NotificationEvent) -> Result<(), ListenerError> {
        match event {
            NotificationEvent::NewNotification(n) => self.insert(n),
            NotificationEvent::MarkedRead(id) => self.mark_read(*id),
            NotificationEvent::AllMarkedRead => {
                self.lock().iter_mut().for_each(|n| n.read = true);
            }
            NotificationEvent::Deleted(id) => self.lock().retain(|n| n.id != *id),
            NotificationEvent::UnreadCountUpdated(_) => {}
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "notification-feed"
    }
}
