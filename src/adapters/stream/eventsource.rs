//! Server-Sent Events connector built on reqwest.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL};
use reqwest::Client;

use crate::domain::foundation::Credential;
use crate::ports::{SseEvent, SseStream, StreamConnector, TransportError};

/// Opens `GET` event streams with the bearer token attached.
#[derive(Debug, Clone, Default)]
pub struct EventSourceConnector {
    client: Client,
}

impl EventSourceConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured client (proxy, TLS roots, connect timeout).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamConnector for EventSourceConnector {
    async fn open(&self, url: &str, credential: &Credential) -> Result<SseStream, TransportError> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, credential.bearer_header())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                status: status.as_u16(),
            });
        }
        tracing::debug!(url, status = status.as_u16(), "Event stream opened");

        let events = response
            .bytes_stream()
            .eventsource()
            .map(|item| match item {
                Ok(event) => Ok(SseEvent {
                    event: event.event,
                    data: event.data,
                    id: (!event.id.is_empty()).then_some(event.id),
                }),
                Err(e) => Err(TransportError::Io(e.to_string())),
            })
            .boxed();
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    #[tokio::test]
    async fn unreachable_host_is_a_connect_error() {
        let credential = Credential::new("tok", UserId::new("u1").unwrap()).unwrap();
        let result = EventSourceConnector::new()
            .open("http://127.0.0.1:1/notifications/stream", &credential)
            .await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }
}
