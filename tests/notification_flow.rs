//! End-to-end tests for notification delivery through the hub.
//!
//! These tests verify the flow from a server push to the surfaces:
//! 1. Socket push is decoded and reaches exactly the registered listeners
//! 2. A dropped socket reconnects after the first backoff and resubscribes
//! 3. Disconnect cancels a pending retry
//! 4. A backgrounded stream reconnects the moment the host is visible again
//!
//! Uses the in-crate mock connectors with paused time, so no network is needed.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{self, Instant};

use seedlab_notify::adapters::binding::{
    ConnectionHub, ConnectionIndicator, IndicatorState, NotificationFeed, SocketManagerFactory,
    StreamManagerFactory, SurfaceBinding, ToastLayer, UnreadBadge,
};
use seedlab_notify::adapters::liveness::ManualLivenessSignal;
use seedlab_notify::adapters::socket::{MockSocketConnector, MockSocketOutcome, SocketManagerConfig};
use seedlab_notify::adapters::stream::{MockStreamConnector, MockStreamOutcome, StreamManagerConfig};
use seedlab_notify::domain::connection::{ConnectionStatus, ReconnectPolicy};
use seedlab_notify::domain::foundation::{Credential, DomainError, UserId};
use seedlab_notify::domain::notification::{Channel, EventKind, Notification, NotificationEvent};
use seedlab_notify::ports::{EventListener, FnListener, NotificationApi, Toast, ToastSink};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn credential() -> Credential {
    Credential::new("token-u1", UserId::new("U1").unwrap()).unwrap()
}

fn notification_body(id: i64, title: &str) -> String {
    json!({
        "id": id,
        "title": title,
        "message": "Lot 2025-117",
        "category": "ANALYSIS",
        "createdAt": "2025-04-02T08:30:00Z",
        "read": false
    })
    .to_string()
}

fn socket_hub(connector: &MockSocketConnector) -> Arc<ConnectionHub> {
    ConnectionHub::new(Arc::new(SocketManagerFactory::new(
        SocketManagerConfig::new("ws://lab.test/ws"),
        Arc::new(connector.clone()),
    )))
}

async fn wait_for(
    binding: &SurfaceBinding,
    f: impl FnMut(&ConnectionStatus) -> bool,
) -> ConnectionStatus {
    let mut rx = binding.lease().expect("mounted").watch_status();
    let status = time::timeout(Duration::from_secs(600), rx.wait_for(f))
        .await
        .expect("status not reached")
        .expect("manager dropped");
    (*status).clone()
}

/// Records toasts shown
#[derive(Default)]
struct RecordingToasts(Mutex<Vec<Toast>>);

impl ToastSink for RecordingToasts {
    fn show(&self, toast: Toast) {
        self.0.lock().unwrap().push(toast);
    }
}

/// Server-side unread count, counting how often it is asked
struct CountingApi {
    unread: AtomicU64,
    calls: AtomicUsize,
}

#[async_trait]
impl NotificationApi for CountingApi {
    async fn unread_count(&self, _: &Credential) -> Result<u64, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.unread.load(Ordering::SeqCst))
    }

    async fn recent(&self, _: &Credential, _: usize) -> Result<Vec<Notification>, DomainError> {
        Ok(Vec::new())
    }
}

// =============================================================================
// Scenario 1: push reaches each listener exactly once
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_new_notification_reaches_listener_once() {
    let connector = MockSocketConnector::new();
    let hub = socket_hub(&connector);
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let listener: Arc<dyn EventListener> = FnListener::shared("recorder", move |event: &NotificationEvent| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    });

    let binding = SurfaceBinding::mount(&hub, &credential(), "recorder", vec![(EventKind::NewNotification, listener)])
        .await
        .unwrap();
    assert!(connector.push(Channel::Inbox, &notification_body(42, "X")));
    time::sleep(Duration::from_millis(10)).await;

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    match &received[0] {
        NotificationEvent::NewNotification(n) => {
            assert_eq!(n.id.value(), 42);
            assert_eq!(n.title, "X");
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(binding.status().is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_surfaces_share_one_connection() {
    let connector = MockSocketConnector::new();
    let hub = socket_hub(&connector);
    let badge = Arc::new(UnreadBadge::new());
    let feed = Arc::new(NotificationFeed::new(20));
    let toasts = Arc::new(RecordingToasts::default());
    let layer = Arc::new(ToastLayer::new(toasts.clone()));

    let _badge = SurfaceBinding::mount(&hub, &credential(), "badge", badge.listeners()).await.unwrap();
    let _feed = SurfaceBinding::mount(&hub, &credential(), "feed", feed.listeners()).await.unwrap();
    let _toasts = SurfaceBinding::mount(&hub, &credential(), "toasts", layer.listeners()).await.unwrap();

    connector.push(Channel::UnreadCount, r#"{"count": 2}"#);
    connector.push(Channel::Inbox, &notification_body(42, "X"));
    connector.push(Channel::Inbox, "{not json");
    connector.push(Channel::MarkedRead, "42");
    time::sleep(Duration::from_millis(10)).await;

    assert_eq!(connector.connect_count(), 1);
    assert_eq!(hub.lease_count(&credential()), 3);
    assert_eq!(badge.count(), 2);
    assert_eq!(toasts.0.lock().unwrap().len(), 1);
    let items = feed.snapshot();
    assert_eq!(items.len(), 1);
    assert!(items[0].read);
}

// =============================================================================
// Scenario 2: drop, reconnect, resubscribe
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_dropped_socket_reconnects_and_resubscribes() {
    let connector = MockSocketConnector::new();
    let hub = socket_hub(&connector);
    let badge = Arc::new(UnreadBadge::new());
    let api = Arc::new(CountingApi {
        unread: AtomicU64::new(5),
        calls: AtomicUsize::new(0),
    });
    let mut binding = SurfaceBinding::mount(&hub, &credential(), "badge", badge.listeners())
        .await
        .unwrap();
    let status = binding.lease().unwrap().watch_status();
    binding.attach(badge.refresh_on_connect(status, api.clone(), credential()));
    time::sleep(Duration::from_millis(10)).await;
    assert_eq!(badge.count(), 5);

    api.unread.store(8, Ordering::SeqCst);
    let dropped_at = Instant::now();
    connector.drop_connection();
    wait_for(&binding, |s| s.retry_pending).await;
    let status = wait_for(&binding, |s| s.is_connected()).await;

    assert!(dropped_at.elapsed() >= Duration::from_secs(1));
    assert!(dropped_at.elapsed() < Duration::from_secs(2));
    assert_eq!(status.attempts, 0);
    assert_eq!(connector.connect_count(), 2);
    assert_eq!(connector.subscribed_destinations().len(), 4);

    time::sleep(Duration::from_millis(10)).await;
    assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    assert_eq!(badge.count(), 8);

    connector.push(Channel::UnreadCount, "9");
    time::sleep(Duration::from_millis(10)).await;
    assert_eq!(badge.count(), 9);
}

// =============================================================================
// Scenario 3: disconnect while a retry is pending
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_unmount_cancels_pending_retry() {
    let connector = MockSocketConnector::new();
    let hub = socket_hub(&connector);
    let binding = SurfaceBinding::mount(&hub, &credential(), "badge", Vec::new())
        .await
        .unwrap();

    connector.set_fallback(MockSocketOutcome::Unreachable);
    connector.drop_connection();
    wait_for(&binding, |s| s.retry_pending).await;

    binding.unmount().await;
    time::sleep(Duration::from_secs(600)).await;

    assert_eq!(connector.connect_count(), 1);
    assert_eq!(hub.connection_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_connection_offers_manual_reconnect() {
    let connector = MockSocketConnector::new().with_fallback(MockSocketOutcome::Unreachable);
    let hub = ConnectionHub::new(Arc::new(SocketManagerFactory::new(
        SocketManagerConfig::new("ws://lab.test/ws")
            .with_policy(ReconnectPolicy::for_socket().with_max_attempts(3)),
        Arc::new(connector.clone()),
    )));
    let binding = SurfaceBinding::mount(&hub, &credential(), "indicator", Vec::new())
        .await
        .unwrap();
    let indicator = ConnectionIndicator::new(binding.lease().unwrap().watch_status());
    assert_eq!(indicator.state(), IndicatorState::Recovering);

    wait_for(&binding, ConnectionStatus::is_exhausted).await;
    time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.connect_count(), 3);
    assert_eq!(indicator.state(), IndicatorState::Offline);
    assert!(indicator.offers_reconnect());

    connector.set_fallback(MockSocketOutcome::Accept);
    binding.lease().unwrap().reconnect().await.unwrap();

    assert_eq!(indicator.state(), IndicatorState::Live);
    assert!(!indicator.offers_reconnect());
}

// =============================================================================
// Scenario 4: stream liveness
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_foregrounded_stream_reconnects_immediately() {
    let connector = MockStreamConnector::new();
    let signal = Arc::new(ManualLivenessSignal::new());
    let hub = ConnectionHub::new(Arc::new(
        StreamManagerFactory::new(
            StreamManagerConfig::new("http://lab.test/notifications/stream"),
            Arc::new(connector.clone()),
        )
        .with_liveness(signal.clone()),
    ));
    let badge = Arc::new(UnreadBadge::new());
    let binding = SurfaceBinding::mount(&hub, &credential(), "badge", badge.listeners())
        .await
        .unwrap();

    // Backgrounded; the drop and the first retry both fail
    signal.set_hidden();
    connector.set_fallback(MockStreamOutcome::Unreachable);
    connector.end_stream();
    wait_for(&binding, |s| s.retry_pending && s.attempts == 2).await;
    connector.set_fallback(MockStreamOutcome::Open);

    let foregrounded_at = Instant::now();
    signal.set_visible();
    let status = wait_for(&binding, |s| s.is_connected()).await;

    assert_eq!(foregrounded_at.elapsed(), Duration::ZERO);
    assert_eq!(status.attempts, 0);
    assert_eq!(connector.open_count(), 3);

    connector.send("notification", &notification_body(43, "Germination finished"));
    time::sleep(Duration::from_millis(10)).await;
    assert_eq!(badge.count(), 1);
}
