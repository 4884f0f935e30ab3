//! StreamConnector port - Interface for opening a one-directional push stream.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::foundation::Credential;

use super::TransportError;

/// One Server-Sent Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; empty means the default `message`.
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    /// Convenience constructor.
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }
}

/// Events until the server ends the stream or it fails.
pub type SseStream = BoxStream<'static, Result<SseEvent, TransportError>>;

/// Port for opening push streams.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Open the stream. Returning `Ok` is the "open" lifecycle callback.
    async fn open(&self, url: &str, credential: &Credential) -> Result<SseStream, TransportError>;
}
