//! Transport-agnostic notification events.

use std::fmt;

use crate::domain::foundation::NotificationId;

use super::Notification;

/// Discriminant of a [`NotificationEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    NewNotification,
    UnreadCountUpdated,
    MarkedRead,
    AllMarkedRead,
    Deleted,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 5] = [
        EventKind::NewNotification,
        EventKind::UnreadCountUpdated,
        EventKind::MarkedRead,
        EventKind::AllMarkedRead,
        EventKind::Deleted,
    ];

    /// Stable name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewNotification => "new-notification",
            EventKind::UnreadCountUpdated => "unread-count-updated",
            EventKind::MarkedRead => "marked-read",
            EventKind::AllMarkedRead => "all-marked-read",
            EventKind::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded push message.
///
/// The variant carries exactly the payload its kind requires, so a kind can
/// never be paired with the wrong payload shape.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    /// A new notification for the current user.
    NewNotification(Notification),
    /// Authoritative unread count from the server.
    UnreadCountUpdated(u64),
    /// One notification was marked read (possibly from another tab).
    MarkedRead(NotificationId),
    /// Every notification was marked read.
    AllMarkedRead,
    /// A notification was deleted.
    Deleted(NotificationId),
}

impl NotificationEvent {
    /// The kind this event is dispatched under.
    pub fn kind(&self) -> EventKind {
        match self {
            NotificationEvent::NewNotification(_) => EventKind::NewNotification,
            NotificationEvent::UnreadCountUpdated(_) => EventKind::UnreadCountUpdated,
            NotificationEvent::MarkedRead(_) => EventKind::MarkedRead,
            NotificationEvent::AllMarkedRead => EventKind::AllMarkedRead,
            NotificationEvent::Deleted(_) => EventKind::Deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            NotificationEvent::UnreadCountUpdated(3).kind(),
            EventKind::UnreadCountUpdated
        );
        assert_eq!(
            NotificationEvent::MarkedRead(NotificationId::new(1)).kind(),
            EventKind::MarkedRead
        );
        assert_eq!(NotificationEvent::AllMarkedRead.kind(), EventKind::AllMarkedRead);
        assert_eq!(
            NotificationEvent::Deleted(NotificationId::new(1)).kind(),
            EventKind::Deleted
        );
    }

    #[test]
    fn kind_names_are_distinct() {
        let mut names: Vec<_> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
    }
}
