//! WebSocket connector built on tokio-tungstenite.

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::domain::foundation::Credential;
use crate::ports::{SocketConnector, SocketLink, SocketSink, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens `ws://` and `wss://` sockets.
///
/// The bearer token rides on the upgrade request as well as in the CONNECT
/// frame, so brokers that authenticate at either point accept it.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SocketConnector for TungsteniteConnector {
    async fn connect(
        &self,
        url: &str,
        credential: &Credential,
    ) -> Result<SocketLink, TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let bearer = HeaderValue::from_str(&credential.bearer_header())
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (ws, response) = connect_async(request).await.map_err(map_connect_error)?;
        tracing::debug!(url, status = response.status().as_u16(), "WebSocket upgraded");

        let (sink, stream) = ws.split();
        let inbound = stream
            .filter_map(|message| async move {
                match message {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(Message::Binary(bytes)) => Some(
                        String::from_utf8(bytes.to_vec())
                            .map_err(|e| TransportError::Io(e.to_string())),
                    ),
                    // Ping/pong are answered by tungstenite; the stream ends after Close
                    Ok(_) => None,
                    Err(WsError::ConnectionClosed) => None,
                    Err(e) => Some(Err(TransportError::Io(e.to_string()))),
                }
            })
            .boxed();

        Ok(SocketLink {
            sink: Box::new(WsSink(sink)),
            inbound,
        })
    }
}

struct WsSink(SplitSink<WsStream, Message>);

#[async_trait]
impl SocketSink for WsSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.0
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
                other => TransportError::Io(other.to_string()),
            })
    }

    async fn close(&mut self) {
        let _ = self.0.close().await;
    }
}

fn map_connect_error(err: WsError) -> TransportError {
    match err {
        WsError::Http(response) => TransportError::Rejected {
            status: response.status().as_u16(),
        },
        other => TransportError::Connect(other.to_string()),
    }
}
