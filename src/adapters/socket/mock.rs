//! Mock socket connector for testing.
//!
//! Plays the broker side of the framed protocol in memory so connection
//! manager behaviour can be exercised without a network.
//!
//! # Features
//!
//! - Scripted outcomes per connect attempt
//! - Automatic CONNECTED / ERROR replies to the handshake
//! - Subscription tracking and message push by channel
//! - Connection drops on demand
//! - Sent frame and connect call history for verification
//!
//! # Example
//!
//! ```ignore
//! let connector = MockSocketConnector::new()
//!     .with_outcome(MockSocketOutcome::Unreachable)
//!     .with_outcome(MockSocketOutcome::Accept);
//!
//! manager.connect(&credential).await?;
//! connector.push(Channel::UnreadCount, "3");
//! connector.drop_connection();
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;

use crate::domain::foundation::Credential;
use crate::domain::notification::Channel;
use crate::ports::{SocketConnector, SocketLink, SocketSink, TransportError};

use super::frame::{Command, Frame};

/// What the mock does for one connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockSocketOutcome {
    /// Open the socket and answer CONNECT with CONNECTED.
    Accept,
    /// Open the socket and answer CONNECT with an ERROR frame.
    RejectHandshake { message: String },
    /// Refuse the upgrade with an HTTP status.
    RefuseUpgrade { status: u16 },
    /// Fail before any socket exists.
    Unreachable,
    /// Open the socket and never answer the handshake.
    Silent,
}

/// Mock connector for testing.
#[derive(Clone, Default)]
pub struct MockSocketConnector {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<MockSocketOutcome>,
    fallback: Option<MockSocketOutcome>,
    server_heart_beat: Option<String>,
    connects: Vec<ConnectCall>,
    sent: Vec<Frame>,
    next_connection: u64,
    live: Option<LiveSocket>,
}

struct LiveSocket {
    connection: u64,
    to_client: mpsc::UnboundedSender<Result<String, TransportError>>,
    /// destination -> subscription id
    subscriptions: HashMap<String, String>,
}

/// A recorded connect call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectCall {
    pub url: String,
    pub subject: String,
}

impl MockSocketConnector {
    /// Creates a connector that accepts every attempt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the outcome of the next unscripted attempt.
    pub fn with_outcome(self, outcome: MockSocketOutcome) -> Self {
        self.lock().script.push_back(outcome);
        self
    }

    /// Outcome used once the script is empty. Defaults to `Accept`.
    pub fn with_fallback(self, outcome: MockSocketOutcome) -> Self {
        self.lock().fallback = Some(outcome);
        self
    }

    /// `heart-beat` header sent in CONNECTED. Defaults to `0,0`.
    pub fn with_server_heart_beat(self, value: impl Into<String>) -> Self {
        self.lock().server_heart_beat = Some(value.into());
        self
    }

    /// Queues an outcome after construction.
    pub fn push_outcome(&self, outcome: MockSocketOutcome) {
        self.lock().script.push_back(outcome);
    }

    /// Replaces the fallback outcome after construction.
    pub fn set_fallback(&self, outcome: MockSocketOutcome) {
        self.lock().fallback = Some(outcome);
    }

    /// Number of transport connections attempted.
    pub fn connect_count(&self) -> usize {
        self.lock().connects.len()
    }

    /// Recorded connect calls.
    pub fn connect_calls(&self) -> Vec<ConnectCall> {
        self.lock().connects.clone()
    }

    /// Every frame the client sent, across connections.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.lock().sent.clone()
    }

    /// Commands the client sent, in order.
    pub fn sent_commands(&self) -> Vec<Command> {
        self.lock().sent.iter().map(|f| f.command).collect()
    }

    /// Destinations subscribed on the live connection.
    pub fn subscribed_destinations(&self) -> Vec<String> {
        let state = self.lock();
        let mut destinations: Vec<String> = state
            .live
            .as_ref()
            .map(|live| live.subscriptions.keys().cloned().collect())
            .unwrap_or_default();
        destinations.sort();
        destinations
    }

    /// A socket is currently open.
    pub fn is_open(&self) -> bool {
        self.lock().live.is_some()
    }

    /// Delivers a MESSAGE on `channel` to the live subscription for it.
    /// Returns false when nothing is subscribed to that channel.
    pub fn push(&self, channel: Channel, body: &str) -> bool {
        let state = self.lock();
        let Some(live) = state.live.as_ref() else {
            return false;
        };
        let suffix = format!("/queue/{}", channel.name());
        let Some((destination, id)) = live
            .subscriptions
            .iter()
            .find(|(destination, _)| destination.ends_with(&suffix))
        else {
            return false;
        };
        let frame = Frame::new(Command::Message)
            .header("subscription", id.as_str())
            .header("destination", destination.as_str())
            .header("message-id", format!("m-{}", state.sent.len()))
            .with_body(body);
        live.to_client.send(Ok(frame.encode())).is_ok()
    }

    /// Delivers raw text to the client.
    pub fn push_raw(&self, text: impl Into<String>) -> bool {
        self.lock()
            .live
            .as_ref()
            .is_some_and(|live| live.to_client.send(Ok(text.into())).is_ok())
    }

    /// Closes the live socket from the server side.
    pub fn drop_connection(&self) {
        self.lock().live = None;
    }

    /// Fails the live socket with an I/O error.
    pub fn fail_connection(&self, reason: &str) {
        if let Some(live) = self.lock().live.take() {
            let _ = live.to_client.send(Err(TransportError::Io(reason.to_string())));
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SocketConnector for MockSocketConnector {
    async fn connect(
        &self,
        url: &str,
        credential: &Credential,
    ) -> Result<SocketLink, TransportError> {
        let mut state = self.lock();
        state.connects.push(ConnectCall {
            url: url.to_string(),
            subject: credential.subject().to_string(),
        });

        let fallback = state.fallback.clone();
        let outcome = state
            .script
            .pop_front()
            .or(fallback)
            .unwrap_or(MockSocketOutcome::Accept);

        match outcome {
            MockSocketOutcome::Unreachable => {
                return Err(TransportError::Connect("connection refused".into()))
            }
            MockSocketOutcome::RefuseUpgrade { status } => {
                return Err(TransportError::Rejected { status })
            }
            _ => {}
        }

        state.next_connection += 1;
        let connection = state.next_connection;
        let (to_client, rx) = mpsc::unbounded_channel();
        state.live = Some(LiveSocket {
            connection,
            to_client,
            subscriptions: HashMap::new(),
        });

        let inbound = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed();

        Ok(SocketLink {
            sink: Box::new(MockSink {
                state: Arc::clone(&self.state),
                connection,
                outcome,
            }),
            inbound,
        })
    }
}

struct MockSink {
    state: Arc<Mutex<MockState>>,
    connection: u64,
    outcome: MockSocketOutcome,
}

#[async_trait]
impl SocketSink for MockSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let frame = match Frame::parse(&text) {
            Ok(Some(frame)) => frame,
            // Heart-beats are not recorded
            Ok(None) => return Ok(()),
            Err(e) => return Err(TransportError::Io(e.to_string())),
        };
        state.sent.push(frame.clone());

        let heart_beat = state
            .server_heart_beat
            .clone()
            .unwrap_or_else(|| "0,0".to_string());
        let Some(live) = state
            .live
            .as_mut()
            .filter(|live| live.connection == self.connection)
        else {
            return Err(TransportError::Closed);
        };

        match frame.command {
            Command::Connect => match &self.outcome {
                MockSocketOutcome::Accept => {
                    let reply = Frame::new(Command::Connected)
                        .header("version", "1.2")
                        .header("heart-beat", heart_beat);
                    let _ = live.to_client.send(Ok(reply.encode()));
                }
                MockSocketOutcome::RejectHandshake { message } => {
                    let reply = Frame::new(Command::Error)
                        .header("message", message.as_str())
                        .with_body(message.as_str());
                    let _ = live.to_client.send(Ok(reply.encode()));
                }
                _ => {}
            },
            Command::Subscribe => {
                if let (Some(id), Some(destination)) = (frame.get("id"), frame.get("destination")) {
                    live.subscriptions
                        .insert(destination.to_string(), id.to_string());
                }
            }
            Command::Unsubscribe => {
                if let Some(id) = frame.get("id") {
                    live.subscriptions.retain(|_, sub| sub.as_str() != id);
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn close(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state
            .live
            .as_ref()
            .is_some_and(|live| live.connection == self.connection)
        {
            state.live = None;
        }
    }
}
