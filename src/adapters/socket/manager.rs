//! Socket connection manager.
//!
//! Owns one multiplexed framed connection per credential and the fixed set
//! of per-user subscriptions on it.
//!
//! ```text
//! connect() ──► open socket ──► CONNECT ──► CONNECTED ──► SUBSCRIBE x4 ──► Connected
//!                                   │                                        │
//!                          ERROR / 401 / 403                         close / error / idle
//!                                   ▼                                        ▼
//!                       Disconnected (Unauthorized)         Disconnected ──► retry timer
//! ```
//!
//! Every task spawned for a session remembers the generation it was started
//! under. `connect()` and `disconnect()` bump the generation, so a stale
//! reader or timer finds a mismatch and leaves the state alone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval};

use crate::domain::connection::{
    ConnectionError, ConnectionState, ConnectionStatus, ReconnectPolicy, RetryCounter,
    RetryDecision,
};
use crate::domain::foundation::Credential;
use crate::domain::notification::{codec, Channel};
use crate::ports::{
    ConnectionManager, EventPublisher, SocketConnector, SocketInbound, SocketLink, SocketSink,
};

use super::frame::{Command, Frame, HeartBeat};

/// How long `disconnect()` waits for the reader to say goodbye.
const READER_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Idle deadline used when the broker sends no heart-beats.
const NO_DEADLINE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Settings for one socket manager.
#[derive(Debug, Clone)]
pub struct SocketManagerConfig {
    /// WebSocket endpoint, e.g. `wss://lab.example.com/ws`.
    pub url: String,
    /// Prefix of per-user destinations.
    pub destination_prefix: String,
    /// Value of the `host` header in CONNECT.
    pub virtual_host: String,
    /// Deadline for socket open plus handshake plus subscriptions.
    pub connect_timeout: Duration,
    /// Heart-beat interval offered to the broker in both directions.
    pub heartbeat_interval: Duration,
    /// Silence after which the connection counts as lost, when the broker
    /// agreed to send heart-beats.
    pub idle_timeout: Duration,
    pub policy: ReconnectPolicy,
}

impl SocketManagerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            destination_prefix: "/user".to_string(),
            virtual_host: "/".to_string(),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
            policy: ReconnectPolicy::for_socket(),
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration, idle_timeout: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_destination_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.destination_prefix = prefix.into();
        self
    }

    pub fn with_virtual_host(mut self, host: impl Into<String>) -> Self {
        self.virtual_host = host.into();
        self
    }
}

/// An active subscription on the current connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub channel: Channel,
    pub destination: String,
}

/// Connection manager for the persistent framed socket.
///
/// # Example
///
/// ```ignore
/// let manager = SocketConnectionManager::new(
///     SocketManagerConfig::new("wss://lab.example.com/ws"),
///     Arc::new(TungsteniteConnector::new()),
///     dispatcher,
/// );
///
/// manager.connect(&credential).await?;
/// ```
pub struct SocketConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: SocketManagerConfig,
    connector: Arc<dyn SocketConnector>,
    publisher: Arc<dyn EventPublisher>,
    shared: Mutex<Shared>,
    status_tx: watch::Sender<ConnectionStatus>,
    /// Serialises connect attempts, explicit and scheduled.
    gate: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct Shared {
    state: ConnectionState,
    credential: Option<Credential>,
    counter: RetryCounter,
    generation: u64,
    error: Option<ConnectionError>,
    subscriptions: Vec<Subscription>,
    session: Option<Session>,
    retry: Option<JoinHandle<()>>,
}

impl Shared {
    fn snapshot(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            attempts: self.counter.get(),
            error: self.error.clone(),
            retry_pending: self.retry.is_some(),
        }
    }
}

struct Session {
    shutdown: oneshot::Sender<()>,
    reader: JoinHandle<()>,
}

impl Session {
    async fn close(self) {
        let Session {
            shutdown,
            mut reader,
        } = self;
        let _ = shutdown.send(());
        if time::timeout(READER_SHUTDOWN_GRACE, &mut reader).await.is_err() {
            reader.abort();
        }
    }
}

/// Socket after a completed handshake.
struct Established {
    sink: Box<dyn SocketSink>,
    inbound: SocketInbound,
    heart_beat: HeartBeat,
    subscriptions: Vec<Subscription>,
}

impl SocketConnectionManager {
    pub fn new(
        config: SocketManagerConfig,
        connector: Arc<dyn SocketConnector>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::default());
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                publisher,
                shared: Mutex::new(Shared::default()),
                status_tx,
                gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Subscriptions on the current connection; empty while not connected.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.inner.lock().subscriptions.clone()
    }

    pub fn config(&self) -> &SocketManagerConfig {
        &self.inner.config
    }
}

#[async_trait]
impl ConnectionManager for SocketConnectionManager {
    async fn connect(&self, credential: &Credential) -> Result<(), ConnectionError> {
        let _gate = self.inner.gate.lock().await;

        let generation = {
            let mut shared = self.inner.lock();
            if shared.state.is_connected() {
                return match &shared.credential {
                    Some(current) if current == credential => Ok(()),
                    _ => Err(ConnectionError::CredentialChanged),
                };
            }
            if let Some(retry) = shared.retry.take() {
                retry.abort();
            }
            // A caller-initiated attempt starts a fresh retry cycle
            shared.counter.reset();
            shared.generation += 1;
            shared.credential = Some(credential.clone());
            shared.generation
        };

        self.inner.establish(generation, credential.clone()).await
    }

    async fn disconnect(&self) {
        let (session, retry) = {
            let mut shared = self.inner.lock();
            shared.generation += 1;
            shared.state = ConnectionState::Disconnected;
            shared.credential = None;
            shared.error = None;
            shared.counter.reset();
            shared.subscriptions.clear();
            let taken = (shared.session.take(), shared.retry.take());
            self.inner.publish(&shared);
            taken
        };

        if let Some(retry) = retry {
            retry.abort();
        }
        if let Some(session) = session {
            session.close().await;
        }
        tracing::info!(url = %self.inner.config.url, "Socket disconnected");
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().state.is_connected()
    }

    fn status(&self) -> ConnectionStatus {
        self.inner.lock().snapshot()
    }

    fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    fn transport(&self) -> &'static str {
        "socket"
    }
}

impl Drop for SocketConnectionManager {
    fn drop(&mut self) {
        let mut shared = self.inner.lock();
        shared.generation += 1;
        if let Some(retry) = shared.retry.take() {
            retry.abort();
        }
        if let Some(session) = shared.session.take() {
            session.reader.abort();
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, shared: &Shared) {
        self.status_tx.send_replace(shared.snapshot());
    }

    async fn establish(
        self: &Arc<Self>,
        generation: u64,
        credential: Credential,
    ) -> Result<(), ConnectionError> {
        {
            let mut shared = self.lock();
            if shared.generation != generation {
                return Err(ConnectionError::Cancelled);
            }
            shared.state = ConnectionState::Connecting;
            self.publish(&shared);
        }
        tracing::debug!(
            user = %credential.subject(),
            url = %self.config.url,
            "Opening socket"
        );

        let outcome = time::timeout(self.config.connect_timeout, self.handshake(&credential))
            .await
            .unwrap_or(Err(ConnectionError::Timeout(self.config.connect_timeout)));

        match outcome {
            Ok(established) => self.on_established(generation, &credential, established).await,
            Err(err) => {
                self.on_connect_failed(generation, &credential, err.clone());
                Err(err)
            }
        }
    }

    async fn handshake(&self, credential: &Credential) -> Result<Established, ConnectionError> {
        let SocketLink {
            mut sink,
            mut inbound,
        } = self.connector.connect(&self.config.url, credential).await?;

        let offered = HeartBeat::new(self.config.heartbeat_interval, self.config.heartbeat_interval);
        sink.send(Frame::connect(&self.config.virtual_host, credential, offered).encode())
            .await?;

        let server_beat = match await_connected(&mut inbound).await {
            Ok(beat) => beat,
            Err(err) => {
                sink.close().await;
                return Err(err);
            }
        };

        let mut subscriptions = Vec::with_capacity(Channel::ALL.len());
        for (index, channel) in Channel::ALL.iter().enumerate() {
            let subscription = Subscription {
                id: format!("sub-{}", index),
                channel: *channel,
                destination: channel
                    .destination(&self.config.destination_prefix, credential.subject()),
            };
            sink.send(Frame::subscribe(&subscription.id, &subscription.destination).encode())
                .await?;
            subscriptions.push(subscription);
        }

        Ok(Established {
            sink,
            inbound,
            heart_beat: HeartBeat::negotiate(offered, server_beat),
            subscriptions,
        })
    }

    async fn on_established(
        self: &Arc<Self>,
        generation: u64,
        credential: &Credential,
        established: Established,
    ) -> Result<(), ConnectionError> {
        let Established {
            mut sink,
            inbound,
            heart_beat,
            subscriptions,
        } = established;

        {
            let mut shared = self.lock();
            if shared.generation == generation {
                let routes: HashMap<String, Channel> = subscriptions
                    .iter()
                    .map(|s| (s.id.clone(), s.channel))
                    .collect();
                let (shutdown, shutdown_rx) = oneshot::channel();
                let reader = tokio::spawn(Arc::clone(self).read(
                    generation,
                    sink,
                    inbound,
                    heart_beat,
                    routes,
                    shutdown_rx,
                ));

                shared.session = Some(Session { shutdown, reader });
                shared.state = ConnectionState::Connected;
                shared.counter.reset();
                shared.error = None;
                shared.subscriptions = subscriptions;
                self.publish(&shared);

                tracing::info!(
                    user = %credential.subject(),
                    url = %self.config.url,
                    subscriptions = shared.subscriptions.len(),
                    "Socket connected"
                );
                return Ok(());
            }
        }

        // disconnect() won the race
        sink.close().await;
        Err(ConnectionError::Cancelled)
    }

    fn on_connect_failed(
        self: &Arc<Self>,
        generation: u64,
        credential: &Credential,
        err: ConnectionError,
    ) {
        let mut shared = self.lock();
        if shared.generation != generation {
            return;
        }

        if err.is_retryable() {
            tracing::warn!(user = %credential.subject(), error = %err, "Socket connect failed");
            self.schedule_retry(&mut shared, err);
        } else {
            tracing::warn!(user = %credential.subject(), error = %err, "Socket handshake rejected");
            shared.state = ConnectionState::Disconnected;
            shared.credential = None;
            shared.error = Some(err);
            self.publish(&shared);
        }
    }

    fn connection_lost(self: &Arc<Self>, generation: u64, err: ConnectionError) {
        let mut shared = self.lock();
        if shared.generation != generation || !shared.state.is_connected() {
            return;
        }
        tracing::warn!(url = %self.config.url, error = %err, "Socket connection lost");
        self.schedule_retry(&mut shared, err);
    }

    fn schedule_retry(self: &Arc<Self>, shared: &mut Shared, err: ConnectionError) {
        shared.state = ConnectionState::Disconnected;
        shared.session = None;
        shared.subscriptions.clear();

        let failures = shared.counter.record_failure();
        match self.config.policy.decide(failures) {
            RetryDecision::Retry { attempt, delay } => {
                shared.error = Some(err);
                shared.retry = Some(tokio::spawn(Arc::clone(self).retry_after(
                    shared.generation,
                    delay,
                )));
                tracing::info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Socket reconnect scheduled"
                );
            }
            RetryDecision::GiveUp { attempts } => {
                shared.error = Some(ConnectionError::RetriesExhausted { attempts });
                shared.retry = None;
                tracing::error!(attempts, last_error = %err, "Socket reconnect attempts exhausted");
            }
        }
        self.publish(shared);
    }

    fn retry_after(self: Arc<Self>, generation: u64, delay: Duration) -> BoxFuture<'static, ()> {
        async move {
            time::sleep(delay).await;
            let _gate = self.gate.lock().await;

            let credential = {
                let mut shared = self.lock();
                if shared.generation != generation || shared.state.is_connected() {
                    return;
                }
                shared.retry = None;
                match shared.credential.clone() {
                    Some(credential) => credential,
                    None => return,
                }
            };

            tracing::debug!(user = %credential.subject(), "Reconnecting socket");
            let _ = self.establish(generation, credential).await;
        }
        .boxed()
    }

    async fn read(
        self: Arc<Self>,
        generation: u64,
        mut sink: Box<dyn SocketSink>,
        mut inbound: SocketInbound,
        heart_beat: HeartBeat,
        routes: HashMap<String, Channel>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let mut beat = (!heart_beat.send.is_zero())
            .then(|| time::interval_at(Instant::now() + heart_beat.send, heart_beat.send));
        let idle_limit = (!heart_beat.receive.is_zero())
            .then(|| self.config.idle_timeout.max(heart_beat.receive * 2));
        let idle = time::sleep(idle_limit.unwrap_or(NO_DEADLINE));
        tokio::pin!(idle);

        let loss = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    let _ = sink.send(Frame::disconnect().encode()).await;
                    sink.close().await;
                    tracing::debug!("Socket reader stopped");
                    return;
                }
                _ = tick(&mut beat) => {
                    if let Err(e) = sink.send("\n".to_string()).await {
                        break ConnectionError::from(e);
                    }
                }
                () = &mut idle, if idle_limit.is_some() => {
                    break ConnectionError::Timeout(idle_limit.unwrap_or_default());
                }
                message = inbound.next() => match message {
                    Some(Ok(text)) => {
                        if let Some(limit) = idle_limit {
                            idle.as_mut().reset(Instant::now() + limit);
                        }
                        if let Err(err) = self.handle_message(&routes, &text) {
                            break err;
                        }
                    }
                    Some(Err(e)) => break ConnectionError::from(e),
                    None => break ConnectionError::Transport("closed by peer".to_string()),
                },
            }
        };

        sink.close().await;
        self.connection_lost(generation, loss);
    }

    fn handle_message(
        &self,
        routes: &HashMap<String, Channel>,
        text: &str,
    ) -> Result<(), ConnectionError> {
        let frame = match Frame::parse(text) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unparseable frame");
                return Ok(());
            }
        };

        match frame.command {
            Command::Message => {
                let subscription = frame.get("subscription").unwrap_or_default();
                let Some(channel) = routes.get(subscription) else {
                    tracing::debug!(subscription, "Dropping message for unknown subscription");
                    return Ok(());
                };
                match codec::decode_channel(*channel, &frame.body) {
                    Ok(event) => {
                        let delivered = self.publisher.emit(&event);
                        tracing::trace!(kind = %event.kind(), delivered, "Event dispatched");
                    }
                    Err(e) => {
                        tracing::warn!(channel = %channel, error = %e, "Dropping undecodable message");
                    }
                }
                Ok(())
            }
            Command::Error => Err(ConnectionError::Protocol(
                frame.get("message").unwrap_or(frame.body.as_str()).to_string(),
            )),
            Command::Receipt => Ok(()),
            other => {
                tracing::debug!(command = %other, "Ignoring unexpected frame");
                Ok(())
            }
        }
    }
}

async fn await_connected(inbound: &mut SocketInbound) -> Result<HeartBeat, ConnectionError> {
    while let Some(message) = inbound.next().await {
        let text = message?;
        let frame = match Frame::parse(&text) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => return Err(ConnectionError::Protocol(e.to_string())),
        };
        return match frame.command {
            Command::Connected => Ok(frame
                .get("heart-beat")
                .and_then(HeartBeat::parse)
                .unwrap_or_default()),
            Command::Error => Err(ConnectionError::Unauthorized(
                frame.get("message").unwrap_or(frame.body.as_str()).to_string(),
            )),
            other => Err(ConnectionError::Protocol(format!(
                "expected CONNECTED, got {}",
                other
            ))),
        };
    }
    Err(ConnectionError::Transport(
        "closed during handshake".to_string(),
    ))
}

async fn tick(beat: &mut Option<Interval>) {
    match beat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
