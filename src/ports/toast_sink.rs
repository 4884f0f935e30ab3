//! ToastSink port - Where user-facing alerts go.

use crate::domain::foundation::NotificationId;
use crate::domain::notification::NotificationCategory;

/// Severity used to style a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl From<NotificationCategory> for ToastLevel {
    fn from(category: NotificationCategory) -> Self {
        match category {
            NotificationCategory::Success | NotificationCategory::Report => ToastLevel::Success,
            NotificationCategory::Warning => ToastLevel::Warning,
            NotificationCategory::Error => ToastLevel::Error,
            NotificationCategory::Info
            | NotificationCategory::Sample
            | NotificationCategory::Analysis
            | NotificationCategory::System => ToastLevel::Info,
        }
    }
}

/// A transient alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub message: String,
    pub level: ToastLevel,
    /// Set when the toast announces a notification.
    pub notification_id: Option<NotificationId>,
}

/// Port for showing toasts.
pub trait ToastSink: Send + Sync {
    fn show(&self, toast: Toast);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_levels() {
        assert_eq!(ToastLevel::from(NotificationCategory::Report), ToastLevel::Success);
        assert_eq!(ToastLevel::from(NotificationCategory::Error), ToastLevel::Error);
        assert_eq!(ToastLevel::from(NotificationCategory::Sample), ToastLevel::Info);
    }
}
