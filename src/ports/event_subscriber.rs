//! EventSubscriber port - Interface for registering interest in events.
//!
//! Binding-layer surfaces register listeners per [`EventKind`] and keep the
//! returned [`Registration`] to undo it on unmount.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::domain::notification::{EventKind, NotificationEvent};

/// Failure reported by a listener. Logged and isolated by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ListenerError(String);

impl ListenerError {
    /// Creates a listener error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Callback invoked for events of the kinds it was registered for.
///
/// Implementations should be:
/// - **Quick** - emission is synchronous and blocks the transport reader
/// - **Isolated** - errors and panics don't affect other listeners
pub trait EventListener: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &NotificationEvent) -> Result<(), ListenerError>;

    /// Listener name for logging.
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<F> {
    name: &'static str,
    f: F,
}

impl<F> FnListener<F>
where
    F: Fn(&NotificationEvent) -> Result<(), ListenerError> + Send + Sync,
{
    /// Wraps `f` under `name`.
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }

    /// Wraps `f` and returns it ready for registration.
    pub fn shared(name: &'static str, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> EventListener for FnListener<F>
where
    F: Fn(&NotificationEvent) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event(&self, event: &NotificationEvent) -> Result<(), ListenerError> {
        (self.f)(event)
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Capability to undo one registration.
///
/// `unregister` is idempotent: the second and later calls do nothing, and
/// it only ever removes the registration it was issued for. Dropping a
/// `Registration` does not unregister.
pub struct Registration {
    kind: EventKind,
    active: AtomicBool,
    cancel: Box<dyn Fn() + Send + Sync>,
}

impl Registration {
    /// Creates a registration whose `cancel` runs at most once.
    pub fn new(kind: EventKind, cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            kind,
            active: AtomicBool::new(true),
            cancel: Box::new(cancel),
        }
    }

    /// Kind this registration listens to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Still registered.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Removes the listener. Safe to call any number of times.
    pub fn unregister(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            (self.cancel)();
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("kind", &self.kind)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Port for registering listeners.
pub trait EventSubscriber: Send + Sync {
    /// Register `listener` for one kind.
    fn register(&self, kind: EventKind, listener: Arc<dyn EventListener>) -> Registration;

    /// Register the same listener for several kinds.
    fn register_all(
        &self,
        kinds: &[EventKind],
        listener: Arc<dyn EventListener>,
    ) -> Vec<Registration> {
        kinds
            .iter()
            .map(|kind| self.register(*kind, Arc::clone(&listener)))
            .collect()
    }
}

/// Combined trait for dispatcher implementations.
pub trait EventBus: super::EventPublisher + EventSubscriber {}

// Blanket implementation - any type that implements both traits is an EventBus
impl<T: super::EventPublisher + EventSubscriber> EventBus for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    // Compile-time check that traits are object-safe
    #[allow(dead_code)]
    fn assert_listener_object_safe(_: &dyn EventListener) {}

    #[allow(dead_code)]
    fn assert_subscriber_object_safe(_: &dyn EventSubscriber) {}

    #[test]
    fn registration_cancels_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registration = Registration::new(EventKind::Deleted, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registration.unregister();
        registration.unregister();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!registration.is_active());
    }

    #[test]
    fn fn_listener_reports_name() {
        let listener = FnListener::new("badge", |_| Ok(()));
        assert_eq!(listener.name(), "badge");
        assert!(listener.on_event(&NotificationEvent::AllMarkedRead).is_ok());
    }
}
