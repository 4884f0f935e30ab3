//! In-process event dispatcher.
//!
//! Maps each [`EventKind`] to the listeners registered for it and delivers
//! synchronously. Holds no transport state; connection managers only see it
//! through [`EventPublisher`], surfaces only through [`EventSubscriber`].

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::domain::notification::{EventKind, NotificationEvent};
use crate::ports::{EventListener, EventPublisher, EventSubscriber, Registration};

/// Event dispatcher shared by a connection and its surfaces.
///
/// Features:
/// - Registration order delivery (not part of the contract)
/// - Per-listener isolation of errors and panics
/// - Listeners may register or unregister from inside a callback
///
/// # Example
///
/// ```ignore
/// let dispatcher = EventDispatcher::new();
/// let registration = dispatcher.register(EventKind::NewNotification, badge);
///
/// dispatcher.emit(&event);
///
/// registration.unregister();
/// ```
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<Registry>,
}

#[derive(Default)]
struct Registry {
    listeners: RwLock<HashMap<EventKind, Vec<Entry>>>,
    next_id: AtomicU64,
}

struct Entry {
    id: u64,
    listener: Arc<dyn EventListener>,
}

impl Registry {
    fn remove(&self, kind: EventKind, id: u64) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(entries) = listeners.get_mut(&kind) {
            entries.retain(|entry| entry.id != id);
            if entries.is_empty() {
                listeners.remove(&kind);
            }
        }
    }

    fn snapshot(&self, kind: EventKind) -> Vec<Arc<dyn EventListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map(|entries| entries.iter().map(|e| Arc::clone(&e.listener)).collect())
            .unwrap_or_default()
    }
}

impl EventDispatcher {
    /// Creates a dispatcher with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher behind an `Arc`.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Number of listeners across all kinds.
    pub fn total_listener_count(&self) -> usize {
        self.registry
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }
}

impl EventSubscriber for EventDispatcher {
    fn register(&self, kind: EventKind, listener: Arc<dyn EventListener>) -> Registration {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(kind = %kind, listener = listener.name(), id, "Registering listener");

        self.registry
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(Entry { id, listener });

        let registry: Weak<Registry> = Arc::downgrade(&self.registry);
        Registration::new(kind, move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(kind, id);
            }
        })
    }
}

impl EventPublisher for EventDispatcher {
    fn emit(&self, event: &NotificationEvent) -> usize {
        let kind = event.kind();
        // Snapshot so the lock is released before any callback runs
        let listeners = self.registry.snapshot(kind);
        tracing::debug!(kind = %kind, listeners = listeners.len(), "Dispatching event");

        let mut delivered = 0;
        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(
                        kind = %kind,
                        listener = listener.name(),
                        error = %e,
                        "Listener failed"
                    );
                }
                Err(_) => {
                    tracing::error!(kind = %kind, listener = listener.name(), "Listener panicked");
                }
            }
        }
        delivered
    }
}
