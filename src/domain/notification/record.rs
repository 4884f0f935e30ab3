//! The notification record as delivered by the server.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{NotificationId, Timestamp, ValidationError};

/// Fixed set of notification categories used by the laboratory portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    #[serde(alias = "info")]
    Info,
    #[serde(alias = "success")]
    Success,
    #[serde(alias = "warning")]
    Warning,
    #[serde(alias = "error")]
    Error,
    /// Sample received, registered or rejected.
    #[serde(alias = "sample")]
    Sample,
    /// Germination, purity or moisture analysis finished.
    #[serde(alias = "analysis")]
    Analysis,
    /// A certificate or report is ready for download.
    #[serde(alias = "report")]
    Report,
    #[serde(alias = "system")]
    System,
}

/// Reference to the record a notification is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedEntity {
    pub entity_type: String,
    pub entity_id: i64,
}

/// A notification addressed to a single user.
///
/// The client only ever receives these; it never constructs one for the
/// server. Deserialization validates the record so a decoded notification
/// is always well-formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NotificationWire", rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<RelatedEntity>,
    pub created_at: Timestamp,
    pub read: bool,
}

impl Notification {
    /// Whether the notification still counts towards the unread badge.
    pub fn is_unread(&self) -> bool {
        !self.read
    }
}

/// Wire shape. The server flattens the related entity into two optional
/// fields and has used `body`/`isRead`/`type` in older payloads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationWire {
    id: NotificationId,
    title: String,
    #[serde(alias = "body", default)]
    message: String,
    #[serde(alias = "type")]
    category: NotificationCategory,
    #[serde(default)]
    entity_type: Option<String>,
    #[serde(default)]
    entity_id: Option<i64>,
    created_at: Timestamp,
    #[serde(alias = "isRead", default)]
    read: bool,
}

impl TryFrom<NotificationWire> for Notification {
    type Error = ValidationError;

    fn try_from(wire: NotificationWire) -> Result<Self, Self::Error> {
        if wire.title.trim().is_empty() {
            return Err(ValidationError::empty_field("title"));
        }

        let related = match (wire.entity_type, wire.entity_id) {
            (Some(entity_type), Some(entity_id)) => Some(RelatedEntity {
                entity_type,
                entity_id,
            }),
            (None, None) => None,
            _ => {
                return Err(ValidationError::invalid_format(
                    "entity",
                    "entityType and entityId must be sent together",
                ))
            }
        };

        Ok(Self {
            id: wire.id,
            title: wire.title,
            message: wire.message,
            category: wire.category,
            related,
            created_at: wire.created_at,
            read: wire.read,
        })
    }
}
