//! Message codec: raw channel name + body into a typed event.
//!
//! Pure and stateless. Callers log and drop a [`DecodeError`]; nothing here
//! touches connection state, so a bad payload can never take the pipeline
//! down.
//!
//! # Accepted payloads
//!
//! | Channel | Body |
//! |---------|------|
//! | `notifications` | Notification JSON |
//! | `unread-count` | `5`, `"5"`, `{"count": 5}`, `{"unreadCount": 5}` |
//! | `marked-read` | `42`, `{"id": 42}`, `{"notificationId": 42}`, `{"all": true}`, `"all"` |
//! | `deleted` | `42`, `{"id": 42}`, `{"notificationId": 42}` |

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::domain::foundation::{NotificationId, UserId};

use super::{Notification, NotificationEvent};

/// Logical channel on the multiplexed socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Per-user inbox of new notifications.
    Inbox,
    /// Per-user unread counter.
    UnreadCount,
    /// Echo of mark-as-read operations.
    MarkedRead,
    /// Echo of delete operations.
    Deleted,
}

impl Channel {
    /// The fixed set subscribed on every connect.
    pub const ALL: [Channel; 4] = [
        Channel::Inbox,
        Channel::UnreadCount,
        Channel::MarkedRead,
        Channel::Deleted,
    ];

    /// Wire name, also the last path segment of the destination.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Inbox => "notifications",
            Channel::UnreadCount => "unread-count",
            Channel::MarkedRead => "marked-read",
            Channel::Deleted => "deleted",
        }
    }

    /// Resolves a wire name. Accepts a full destination path as well.
    pub fn from_name(name: &str) -> Option<Self> {
        let last = name.rsplit('/').next().unwrap_or(name);
        match last {
            "notifications" | "notification" | "new-notification" => Some(Channel::Inbox),
            "unread-count" | "count" => Some(Channel::UnreadCount),
            "marked-read" | "read" => Some(Channel::MarkedRead),
            "deleted" | "delete" => Some(Channel::Deleted),
            _ => None,
        }
    }

    /// Per-user destination, e.g. `/user/u1/queue/notifications`.
    pub fn destination(&self, prefix: &str, user: &UserId) -> String {
        format!(
            "{}/{}/queue/{}",
            prefix.trim_end_matches('/'),
            user.as_str(),
            self.name()
        )
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stream event names that carry no notification payload.
pub const STREAM_CONNECTED: &str = "connected";
pub const STREAM_HEARTBEAT: &str = "heartbeat";
pub const STREAM_NOTIFICATION: &str = "notification";

/// Why a payload could not be turned into an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("unknown stream event '{0}'")]
    UnknownEvent(String),

    #[error("empty payload on {channel}")]
    EmptyPayload { channel: Channel },

    #[error("malformed {channel} payload: {reason}")]
    Malformed { channel: Channel, reason: String },
}

impl DecodeError {
    fn malformed(channel: Channel, reason: impl Into<String>) -> Self {
        DecodeError::Malformed {
            channel,
            reason: reason.into(),
        }
    }
}

/// Decodes a message addressed by raw channel name or destination.
pub fn decode(channel_name: &str, body: &str) -> Result<NotificationEvent, DecodeError> {
    let channel = Channel::from_name(channel_name)
        .ok_or_else(|| DecodeError::UnknownChannel(channel_name.to_string()))?;
    decode_channel(channel, body)
}

/// Decodes a message received on a known channel.
pub fn decode_channel(channel: Channel, body: &str) -> Result<NotificationEvent, DecodeError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(DecodeError::EmptyPayload { channel });
    }

    match channel {
        Channel::Inbox => serde_json::from_str::<Notification>(body)
            .map(NotificationEvent::NewNotification)
            .map_err(|e| DecodeError::malformed(channel, e.to_string())),
        Channel::UnreadCount => {
            let value = parse_value(channel, body)?;
            count_from(&value)
                .map(NotificationEvent::UnreadCountUpdated)
                .ok_or_else(|| DecodeError::malformed(channel, "expected a non-negative count"))
        }
        Channel::MarkedRead => {
            let value = parse_value(channel, body)?;
            if is_all_marker(&value) {
                return Ok(NotificationEvent::AllMarkedRead);
            }
            id_from(&value)
                .map(NotificationEvent::MarkedRead)
                .ok_or_else(|| DecodeError::malformed(channel, "expected a notification id"))
        }
        Channel::Deleted => {
            let value = parse_value(channel, body)?;
            id_from(&value)
                .map(NotificationEvent::Deleted)
                .ok_or_else(|| DecodeError::malformed(channel, "expected a notification id"))
        }
    }
}

/// Decodes a Server-Sent Event.
///
/// Returns `Ok(None)` for control events (`connected`, `heartbeat`) that
/// only prove liveness.
pub fn decode_stream(event: &str, data: &str) -> Result<Option<NotificationEvent>, DecodeError> {
    match event {
        STREAM_CONNECTED | STREAM_HEARTBEAT => Ok(None),
        // An unnamed SSE event defaults to "message"; the server only sends
        // notifications that way.
        STREAM_NOTIFICATION | "message" | "" => decode_channel(Channel::Inbox, data).map(Some),
        other => match Channel::from_name(other) {
            Some(channel) => decode_channel(channel, data).map(Some),
            None => Err(DecodeError::UnknownEvent(other.to_string())),
        },
    }
}

fn parse_value(channel: Channel, body: &str) -> Result<Value, DecodeError> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => Ok(value),
        // Some brokers send bare scalars unquoted, e.g. `all`.
        Err(_) if body.chars().all(|c| c.is_ascii_alphanumeric()) => {
            Ok(Value::String(body.to_string()))
        }
        Err(e) => Err(DecodeError::malformed(channel, e.to_string())),
    }
}

fn count_from(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(map) => map
            .get("count")
            .or_else(|| map.get("unreadCount"))
            .and_then(count_from),
        _ => None,
    }
}

fn id_from(value: &Value) -> Option<NotificationId> {
    match value {
        Value::Number(n) => n.as_i64().map(NotificationId::new),
        Value::String(s) => s.parse().ok(),
        Value::Object(map) => map
            .get("id")
            .or_else(|| map.get("notificationId"))
            .and_then(id_from),
        _ => None,
    }
}

fn is_all_marker(value: &Value) -> bool {
    match value {
        Value::String(s) => s.eq_ignore_ascii_case("all"),
        Value::Object(map) => map.get("all").and_then(Value::as_bool).unwrap_or(false),
        _ => false,
    }
}
