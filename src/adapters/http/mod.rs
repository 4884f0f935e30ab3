//! HTTP adapters - REST API clients.
//!
//! - `HttpNotificationApi` - Unread count and recent notifications

mod notification_api;

pub use notification_api::{HttpNotificationApi, HttpNotificationApiConfig};
