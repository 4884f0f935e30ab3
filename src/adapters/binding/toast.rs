//! Toast surface and the logging sink used by the binary.

use std::sync::Arc;

use crate::domain::notification::{EventKind, Notification, NotificationEvent};
use crate::ports::{EventListener, ListenerError, Toast, ToastLevel, ToastSink};

use super::SurfaceListeners;

/// Turns new notifications into toasts.
pub struct ToastLayer {
    sink: Arc<dyn ToastSink>,
}

impl ToastLayer {
    pub fn new(sink: Arc<dyn ToastSink>) -> Self {
        Self { sink }
    }

    pub fn listeners(self: &Arc<Self>) -> SurfaceListeners {
        vec![(EventKind::NewNotification, Arc::clone(self) as Arc<dyn EventListener>)]
    }

    fn toast_for(notification: &Notification) -> Toast {
        Toast {
            title: notification.title.clone(),
            message: notification.message.clone(),
            level: ToastLevel::from(notification.category),
            notification_id: Some(notification.id),
        }
    }
}

impl EventListener for ToastLayer {
    fn on_event(&self, event: &NotificationEvent) -> Result<(), ListenerError> {
        if let NotificationEvent::NewNotification(notification) = event {
            // Already read elsewhere, e.g. in another tab
            if notification.is_unread() {
                self.sink.show(Self::toast_for(notification));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "toast-layer"
    }
}

/// Writes toasts to the log. Used by the headless listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingToastSink;

impl ToastSink for TracingToastSink {
    fn show(&self, toast: Toast) {
        let id = toast.notification_id.map(|id| id.value());
        match toast.level {
            ToastLevel::Error => {
                tracing::error!(id, title = %toast.title, message = %toast.message, "Notification")
            }
            ToastLevel::Warning => {
                tracing::warn!(id, title = %toast.title, message = %toast.message, "Notification")
            }
            ToastLevel::Info | ToastLevel::Success => {
                tracing::info!(id, title = %toast.title, message = %toast.message, "Notification")
            }
        }
    }
}
