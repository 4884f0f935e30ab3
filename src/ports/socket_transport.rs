//! SocketConnector port - Interface for opening a persistent text socket.
//!
//! The connection manager speaks the framed pub/sub protocol over whatever
//! this port returns; the port itself only moves text messages.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::foundation::Credential;

use super::TransportError;

/// Inbound half: text messages until the peer closes (stream ends) or fails.
pub type SocketInbound = BoxStream<'static, Result<String, TransportError>>;

/// Outbound half of an open socket.
#[async_trait]
pub trait SocketSink: Send {
    /// Send one text message.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the socket. Errors are ignored; the socket is gone either way.
    async fn close(&mut self);
}

/// An open socket split into its two halves.
pub struct SocketLink {
    pub sink: Box<dyn SocketSink>,
    pub inbound: SocketInbound,
}

/// Port for opening sockets.
#[async_trait]
pub trait SocketConnector: Send + Sync {
    /// Open a socket to `url`. The credential may be attached to the
    /// upgrade request; the framed handshake carries it as well.
    async fn connect(&self, url: &str, credential: &Credential)
        -> Result<SocketLink, TransportError>;
}
