//! Stream connection manager.
//!
//! One-directional Server-Sent Events. The transport offers no reliable
//! "am I connected" query, so the manager keeps its own `connected` flag and
//! flips it from the two lifecycle callbacks: open and error.
//!
//! ```text
//! connect() ──► GET stream ──► open ──► connected = true ──► reader
//!                                 │                            │
//!                              error ◄──── end / error / idle ─┘
//!                                 │
//!                                 ▼
//!      connected = false, delay = policy(attempt) ──► retry ... give up
//!                                 ▲
//!      host visible again ────────┘ (counter reset, immediate attempt)
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::domain::connection::{
    ConnectionError, ConnectionState, ConnectionStatus, ReconnectPolicy, RetryCounter,
    RetryDecision,
};
use crate::domain::foundation::Credential;
use crate::domain::notification::codec;
use crate::ports::{
    ConnectionManager, EventPublisher, LivenessSignal, SseEvent, SseStream, StreamConnector,
    Visibility,
};

/// Settings for one stream manager.
#[derive(Debug, Clone)]
pub struct StreamManagerConfig {
    /// Event stream endpoint, e.g. `https://lab.example.com/api/notifications/stream`.
    pub url: String,
    /// Deadline for the server to answer the `GET`.
    pub open_timeout: Duration,
    /// Silence (no event, heartbeat included) after which the stream counts
    /// as broken.
    pub idle_timeout: Duration,
    pub policy: ReconnectPolicy,
}

impl StreamManagerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            open_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(90),
            policy: ReconnectPolicy::for_stream(),
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// Connection manager for the push stream.
///
/// # Example
///
/// ```ignore
/// let manager = StreamConnectionManager::new(
///     StreamManagerConfig::new("https://lab.example.com/api/notifications/stream"),
///     Arc::new(EventSourceConnector::new()),
///     dispatcher,
/// )
/// .with_liveness(&visibility);
///
/// manager.connect(&credential).await?;
/// ```
pub struct StreamConnectionManager {
    inner: Arc<Inner>,
    liveness: Option<JoinHandle<()>>,
}

struct Inner {
    config: StreamManagerConfig,
    connector: Arc<dyn StreamConnector>,
    publisher: Arc<dyn EventPublisher>,
    shared: Mutex<Shared>,
    status_tx: watch::Sender<ConnectionStatus>,
    gate: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct Shared {
    connected: bool,
    opening: bool,
    credential: Option<Credential>,
    counter: RetryCounter,
    generation: u64,
    error: Option<ConnectionError>,
    reader: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
}

impl Shared {
    fn snapshot(&self) -> ConnectionStatus {
        let state = if self.connected {
            ConnectionState::Connected
        } else if self.opening {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disconnected
        };
        ConnectionStatus {
            state,
            attempts: self.counter.get(),
            error: self.error.clone(),
            retry_pending: self.retry.is_some(),
        }
    }
}

impl StreamConnectionManager {
    pub fn new(
        config: StreamManagerConfig,
        connector: Arc<dyn StreamConnector>,
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
            liveness: None,
        }
    }

    /// Reconnect immediately whenever `signal` reports the host visible.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_liveness(mut self, signal: &dyn LivenessSignal) -> Self {
        if let Some(previous) = self.liveness.take() {
            previous.abort();
        }
        let rx = signal.subscribe();
        self.liveness = Some(tokio::spawn(watch_liveness(
            Arc::downgrade(&self.inner),
            rx,
        )));
        self
    }

    pub fn config(&self) -> &StreamManagerConfig {
        &self.inner.config
    }
}

#[async_trait]
impl ConnectionManager for StreamConnectionManager {
    async fn connect(&self, credential: &Credential) -> Result<(), ConnectionError> {
        let _gate = self.inner.gate.lock().await;

        let generation = {
            let mut shared = self.inner.lock();
            if shared.connected {
                return match &shared.credential {
                    Some(current) if current == credential => Ok(()),
                    _ => Err(ConnectionError::CredentialChanged),
                };
            }
            if let Some(retry) = shared.retry.take() {
                retry.abort();
            }
            shared.counter.reset();
            shared.generation += 1;
            shared.credential = Some(credential.clone());
            shared.generation
        };

        self.inner.open(generation, credential.clone()).await
    }

    async fn disconnect(&self) {
        let (reader, retry) = {
            let mut shared = self.inner.lock();
            shared.generation += 1;
            shared.connected = false;
            shared.opening = false;
            shared.credential = None;
            shared.error = None;
            shared.counter.reset();
            let taken = (shared.reader.take(), shared.retry.take());
            self.inner.publish(&shared);
            taken
        };

        if let Some(retry) = retry {
            retry.abort();
        }
        // Dropping the stream closes the HTTP response
        if let Some(reader) = reader {
            reader.abort();
        }
        tracing::info!(url = %self.inner.config.url, "Stream disconnected");
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    fn status(&self) -> ConnectionStatus {
        self.inner.lock().snapshot()
    }

    fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    fn transport(&self) -> &'static str {
        "stream"
    }
}

impl Drop for StreamConnectionManager {
    fn drop(&mut self) {
        if let Some(liveness) = self.liveness.take() {
            liveness.abort();
        }
        let mut shared = self.inner.lock();
        shared.generation += 1;
        if let Some(retry) = shared.retry.take() {
            retry.abort();
        }
        if let Some(reader) = shared.reader.take() {
            reader.abort();
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

    async fn open(
        self: &Arc<Self>,
        generation: u64,
        credential: Credential,
    ) -> Result<(), ConnectionError> {
        {
            let mut shared = self.lock();
            if shared.generation != generation {
                return Err(ConnectionError::Cancelled);
            }
            shared.opening = true;
            self.publish(&shared);
        }
        tracing::debug!(user = %credential.subject(), url = %self.config.url, "Opening stream");

        let opened = time::timeout(
            self.config.open_timeout,
            self.connector.open(&self.config.url, &credential),
        )
        .await;
        let outcome = match opened {
            Ok(Ok(events)) => Ok(events),
            Ok(Err(e)) => Err(ConnectionError::from(e)),
            Err(_) => Err(ConnectionError::Timeout(self.config.open_timeout)),
        };

        match outcome {
            Ok(events) => self.on_open(generation, &credential, events),
            Err(err) => {
                self.on_error(generation, err.clone());
                Err(err)
            }
        }
    }

    /// Open callback.
    fn on_open(
        self: &Arc<Self>,
        generation: u64,
        credential: &Credential,
        events: SseStream,
    ) -> Result<(), ConnectionError> {
        let mut shared = self.lock();
        if shared.generation != generation {
            return Err(ConnectionError::Cancelled);
        }

        shared.reader = Some(tokio::spawn(Arc::clone(self).read(generation, events)));
        shared.connected = true;
        shared.opening = false;
        shared.counter.reset();
        shared.error = None;
        self.publish(&shared);

        tracing::info!(user = %credential.subject(), url = %self.config.url, "Stream connected");
        Ok(())
    }

    /// Error callback, for failed opens and broken streams alike.
    fn on_error(self: &Arc<Self>, generation: u64, err: ConnectionError) {
        let mut shared = self.lock();
        if shared.generation != generation {
            return;
        }
        shared.connected = false;
        shared.opening = false;
        shared.reader = None;

        if !err.is_retryable() {
            tracing::warn!(error = %err, "Stream rejected");
            shared.credential = None;
            shared.error = Some(err);
            self.publish(&shared);
            return;
        }

        let failures = shared.counter.record_failure();
        match self.config.policy.decide(failures) {
            RetryDecision::Retry { attempt, delay } => {
                tracing::warn!(
                    error = %err,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Stream error, reconnect scheduled"
                );
                shared.error = Some(err);
                shared.retry = Some(tokio::spawn(
                    Arc::clone(self).retry_after(generation, delay),
                ));
            }
            RetryDecision::GiveUp { attempts } => {
                tracing::error!(
                    attempts,
                    last_error = %err,
                    "Stream reconnect attempts exhausted, waiting for an external trigger"
                );
                shared.error = Some(ConnectionError::RetriesExhausted { attempts });
                shared.retry = None;
            }
        }
        self.publish(&shared);
    }

    /// Host came back to the foreground.
    fn on_visible(self: &Arc<Self>) {
        let mut shared = self.lock();
        if shared.connected || shared.opening || shared.credential.is_none() {
            return;
        }

        if let Some(retry) = shared.retry.take() {
            retry.abort();
        }
        shared.counter.reset();
        shared.generation += 1;
        let generation = shared.generation;
        shared.retry = Some(tokio::spawn(
            Arc::clone(self).retry_after(generation, Duration::ZERO),
        ));
        self.publish(&shared);

        tracing::info!(url = %self.config.url, "Host visible again, reconnecting stream now");
    }

    fn retry_after(self: Arc<Self>, generation: u64, delay: Duration) -> BoxFuture<'static, ()> {
        async move {
            if !delay.is_zero() {
                time::sleep(delay).await;
            }
            let _gate = self.gate.lock().await;

            let credential = {
                let mut shared = self.lock();
                if shared.generation != generation || shared.connected {
                    return;
                }
                shared.retry = None;
                match shared.credential.clone() {
                    Some(credential) => credential,
                    None => return,
                }
            };

            tracing::debug!(user = %credential.subject(), "Reconnecting stream");
            let _ = self.open(generation, credential).await;
        }
        .boxed()
    }

    async fn read(self: Arc<Self>, generation: u64, mut events: SseStream) {
        let idle_timeout = self.config.idle_timeout;
        let idle = time::sleep(idle_timeout);
        tokio::pin!(idle);

        let err = loop {
            tokio::select! {
                () = &mut idle => break ConnectionError::Timeout(idle_timeout),
                next = events.next() => match next {
                    Some(Ok(event)) => {
                        idle.as_mut().reset(Instant::now() + idle_timeout);
                        self.handle_event(&event);
                    }
                    Some(Err(e)) => break ConnectionError::from(e),
                    None => break ConnectionError::Transport("stream ended".to_string()),
                },
            }
        };

        self.on_error(generation, err);
    }

    fn handle_event(&self, event: &SseEvent) {
        match codec::decode_stream(&event.event, &event.data) {
            Ok(Some(decoded)) => {
                let delivered = self.publisher.emit(&decoded);
                tracing::trace!(kind = %decoded.kind(), delivered, "Event dispatched");
            }
            Ok(None) => tracing::trace!(event = %event.event, "Control event"),
            Err(e) => tracing::warn!(error = %e, "Dropping undecodable stream event"),
        }
    }
}

async fn watch_liveness(inner: Weak<Inner>, mut rx: watch::Receiver<Visibility>) {
    while rx.changed().await.is_ok() {
        if *rx.borrow_and_update() != Visibility::Visible {
            continue;
        }
        match inner.upgrade() {
            Some(inner) => inner.on_visible(),
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::EventDispatcher;
    use crate::adapters::liveness::ManualLivenessSignal;
    use crate::adapters::stream::{MockStreamConnector, MockStreamOutcome};
    use crate::domain::foundation::UserId;
    use crate::domain::notification::{EventKind, NotificationEvent};
    use crate::ports::{EventSubscriber, FnListener};

    const NOTIFICATION: &str = r#"{"id":7,"title":"Germination report ready","message":"Lot 42","category":"REPORT","createdAt":"2025-03-01T08:00:00Z","read":false}"#;

    fn credential() -> Credential {
        Credential::new("tok", UserId::new("u1").unwrap()).unwrap()
    }

    fn manager(connector: &MockStreamConnector) -> (StreamConnectionManager, EventDispatcher) {
        let dispatcher = EventDispatcher::new();
        let manager = StreamConnectionManager::new(
            StreamManagerConfig::new("http://test/notifications/stream"),
            Arc::new(connector.clone()),
            Arc::new(dispatcher.clone()),
        );
        (manager, dispatcher)
    }

    async fn wait_for(
        manager: &StreamConnectionManager,
        f: impl FnMut(&ConnectionStatus) -> bool,
    ) -> ConnectionStatus {
        let mut rx = manager.watch_status();
        let status = time::timeout(Duration::from_secs(600), rx.wait_for(f))
            .await
            .expect("status not reached")
            .expect("manager dropped");
        (*status).clone()
    }

    #[tokio::test(start_paused = true)]
    async fn connect_marks_connected_on_open() {
        let connector = MockStreamConnector::new();
        let (manager, _) = manager(&connector);

        manager.connect(&credential()).await.unwrap();

        assert!(manager.is_connected());
        assert_eq!(manager.transport(), "stream");
        assert_eq!(connector.opened_urls(), vec!["http://test/notifications/stream"]);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_while_connected_is_noop() {
        let connector = MockStreamConnector::new();
        let (manager, _) = manager(&connector);

        manager.connect(&credential()).await.unwrap();
        manager.connect(&credential()).await.unwrap();

        assert_eq!(connector.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn notification_events_reach_listeners() {
        let connector = MockStreamConnector::new();
        let (manager, dispatcher) = manager(&connector);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let _registration = dispatcher.register(
            EventKind::NewNotification,
            FnListener::shared("recorder", move |event| {
                sink.lock().unwrap().push(event.clone());
                Ok(())
            }),
        );
        manager.connect(&credential()).await.unwrap();

        connector.heartbeat();
        connector.send("presence", "{}");
        connector.send("notification", "{broken");
        connector.send("notification", NOTIFICATION);
        time::sleep(Duration::from_millis(10)).await;

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert!(matches!(&received[0], NotificationEvent::NewNotification(n) if n.id.value() == 7));
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn stream_end_retries_after_linear_delay() {
        let connector = MockStreamConnector::new();
        let (manager, _) = manager(&connector);
        manager.connect(&credential()).await.unwrap();

        connector.end_stream();
        let status = wait_for(&manager, |s| s.retry_pending).await;
        assert!(!status.is_connected());
        assert_eq!(status.attempts, 1);

        time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(connector.open_count(), 1);

        wait_for(&manager, |s| s.is_connected()).await;
        assert_eq!(connector.open_count(), 2);
        assert_eq!(manager.status().attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_stop_after_max_attempts() {
        let connector = MockStreamConnector::new().with_fallback(MockStreamOutcome::Unreachable);
        let (manager, _) = manager(&connector);

        let _ = manager.connect(&credential()).await;
        let status = wait_for(&manager, ConnectionStatus::is_exhausted).await;
        time::sleep(Duration::from_secs(600)).await;

        assert_eq!(connector.open_count(), 5);
        assert_eq!(status.attempts, 5);
        assert!(!manager.status().retry_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_is_not_retried() {
        let connector =
            MockStreamConnector::new().with_outcome(MockStreamOutcome::Reject { status: 401 });
        let (manager, _) = manager(&connector);

        let err = manager.connect(&credential()).await.unwrap_err();
        time::sleep(Duration::from_secs(600)).await;

        assert!(matches!(err, ConnectionError::Unauthorized(_)));
        assert_eq!(connector.open_count(), 1);
        assert!(manager.status().is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_status_is_retried() {
        let connector =
            MockStreamConnector::new().with_outcome(MockStreamOutcome::Reject { status: 503 });
        let (manager, _) = manager(&connector);

        let err = manager.connect(&credential()).await.unwrap_err();

        assert!(matches!(err, ConnectionError::Transport(_)));
        wait_for(&manager, |s| s.is_connected()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_open_times_out() {
        let connector = MockStreamConnector::new().with_outcome(MockStreamOutcome::Hang);
        let (manager, _) = manager(&connector);

        let err = manager.connect(&credential()).await.unwrap_err();

        assert!(matches!(err, ConnectionError::Timeout(_)));
        assert!(manager.status().retry_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_stream_is_treated_as_error() {
        let connector = MockStreamConnector::new();
        let dispatcher = EventDispatcher::new();
        let manager = StreamConnectionManager::new(
            StreamManagerConfig::new("http://test/notifications/stream")
                .with_idle_timeout(Duration::from_secs(30)),
            Arc::new(connector.clone()),
            Arc::new(dispatcher),
        );
        manager.connect(&credential()).await.unwrap();

        time::sleep(Duration::from_secs(20)).await;
        connector.heartbeat();
        time::sleep(Duration::from_secs(20)).await;
        assert!(manager.is_connected());

        let status = wait_for(&manager, |s| s.retry_pending).await;
        assert!(matches!(status.error, Some(ConnectionError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn visibility_reconnects_immediately() {
        let connector = MockStreamConnector::new();
        let signal = ManualLivenessSignal::new();
        let (manager, _) = manager(&connector);
        let manager = manager.with_liveness(&signal);
        manager.connect(&credential()).await.unwrap();

        signal.set_hidden();
        connector.set_fallback(MockStreamOutcome::Unreachable);
        connector.end_stream();
        wait_for(&manager, |s| s.retry_pending).await;
        connector.set_fallback(MockStreamOutcome::Open);

        let before = Instant::now();
        signal.set_visible();
        wait_for(&manager, |s| s.is_connected()).await;

        assert_eq!(before.elapsed(), Duration::ZERO);
        assert_eq!(connector.open_count(), 2);
        assert_eq!(manager.status().attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn visibility_revives_exhausted_stream() {
        let connector = MockStreamConnector::new().with_fallback(MockStreamOutcome::Unreachable);
        let signal = ManualLivenessSignal::new();
        let (manager, _) = manager(&connector);
        let manager = manager.with_liveness(&signal);

        let _ = manager.connect(&credential()).await;
        wait_for(&manager, ConnectionStatus::is_exhausted).await;
        connector.set_fallback(MockStreamOutcome::Open);

        signal.set_visible();
        wait_for(&manager, |s| s.is_connected()).await;

        assert_eq!(connector.open_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn visibility_is_ignored_after_disconnect() {
        let connector = MockStreamConnector::new();
        let signal = ManualLivenessSignal::new();
        let (manager, _) = manager(&connector);
        let manager = manager.with_liveness(&signal);
        manager.connect(&credential()).await.unwrap();

        manager.disconnect().await;
        signal.set_visible();
        time::sleep(Duration::from_secs(60)).await;

        assert_eq!(connector.open_count(), 1);
        assert!(!manager.is_connected());
        assert!(!connector.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn visibility_while_connected_does_nothing() {
        let connector = MockStreamConnector::new();
        let signal = ManualLivenessSignal::new();
        let (manager, _) = manager(&connector);
        let manager = manager.with_liveness(&signal);
        manager.connect(&credential()).await.unwrap();

        signal.set_visible();
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(connector.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_retry() {
        let connector = MockStreamConnector::new().with_fallback(MockStreamOutcome::Unreachable);
        let (manager, _) = manager(&connector);

        let _ = manager.connect(&credential()).await;
        manager.disconnect().await;
        manager.disconnect().await;
        time::sleep(Duration::from_secs(600)).await;

        assert_eq!(connector.open_count(), 1);
        assert_eq!(manager.status(), ConnectionStatus::default());
    }
}
