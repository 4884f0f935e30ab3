//! Integration tests for the production connectors against a local server.
//!
//! An axum server plays the portal:
//! - `/ws` speaks STOMP over WebSocket and checks the bearer token
//! - `/notifications/stream` serves Server-Sent Events
//!
//! The managers run on real time here, so deadlines are generous.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use seedlab_notify::adapters::events::EventDispatcher;
use seedlab_notify::adapters::socket::frame::{Command, Frame};
use seedlab_notify::adapters::socket::{SocketConnectionManager, SocketManagerConfig, TungsteniteConnector};
use seedlab_notify::adapters::stream::{EventSourceConnector, StreamConnectionManager, StreamManagerConfig};
use seedlab_notify::domain::connection::{ConnectionError, ConnectionStatus};
use seedlab_notify::domain::foundation::{Credential, UserId};
use seedlab_notify::domain::notification::{EventKind, NotificationEvent};
use seedlab_notify::ports::{ConnectionManager, EventSubscriber, FnListener};

// =============================================================================
// Test Infrastructure
// =============================================================================

const TOKEN: &str = "token-u1";

fn credential(token: &str) -> Credential {
    Credential::new(token, UserId::new("U1").unwrap()).unwrap()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

async fn ws_handler(headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(stomp_session)
}

/// Minimal broker: CONNECTED on CONNECT, then one unread-count MESSAGE once
/// all four subscriptions are in.
async fn stomp_session(mut socket: WebSocket) {
    let mut subscriptions: Vec<(String, String)> = Vec::new();
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else { continue };
        let Ok(Some(frame)) = Frame::parse(&text) else { continue };

        match frame.command {
            Command::Connect => {
                let reply = Frame::new(Command::Connected)
                    .header("version", "1.2")
                    .header("heart-beat", "0,0");
                if socket.send(Message::Text(reply.encode())).await.is_err() {
                    return;
                }
            }
            Command::Subscribe => {
                let id = frame.get("id").unwrap_or_default().to_string();
                let destination = frame.get("destination").unwrap_or_default().to_string();
                subscriptions.push((id, destination));
                if subscriptions.len() == 4 {
                    let Some((id, destination)) = subscriptions
                        .iter()
                        .find(|(_, destination)| destination.ends_with("/queue/unread-count"))
                    else {
                        return;
                    };
                    let message = Frame::new(Command::Message)
                        .header("subscription", id.as_str())
                        .header("destination", destination.as_str())
                        .header("message-id", "1")
                        .with_body(json!({ "count": 3 }).to_string());
                    if socket.send(Message::Text(message.encode())).await.is_err() {
                        return;
                    }
                }
            }
            Command::Disconnect => return,
            _ => {}
        }
    }
}

async fn sse_handler(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let notification = json!({
        "id": 42,
        "title": "X",
        "message": "Lot 2025-117",
        "category": "REPORT",
        "createdAt": "2025-04-02T08:30:00Z",
        "read": false
    });
    let events = vec![
        Event::default().event("connected").data("ok"),
        Event::default().event("heartbeat").data(""),
        Event::default().event("notification").id("42").data(notification.to_string()),
    ];
    let stream = stream::iter(events.into_iter().map(Ok::<_, Infallible>))
        .chain(stream::pending());
    Sse::new(stream).into_response()
}

async fn serve() -> String {
    let router = Router::new()
        .route("/ws", get(ws_handler))
        .route("/notifications/stream", get(sse_handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("127.0.0.1:{}", addr.port())
}

fn recording(dispatcher: &EventDispatcher, kind: EventKind) -> Arc<Mutex<Vec<NotificationEvent>>> {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let registration = dispatcher.register(
        kind,
        FnListener::shared("recorder", move |event: &NotificationEvent| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        }),
    );
    // Dropping a registration keeps the listener
    drop(registration);
    received
}

async fn eventually(f: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !f() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

// =============================================================================
// Socket
// =============================================================================

#[tokio::test]
async fn test_socket_manager_over_websocket() {
    let addr = serve().await;
    let dispatcher = EventDispatcher::new();
    let received = recording(&dispatcher, EventKind::UnreadCountUpdated);
    let manager = SocketConnectionManager::new(
        SocketManagerConfig::new(format!("ws://{}/ws", addr)),
        Arc::new(TungsteniteConnector::new()),
        Arc::new(dispatcher.clone()),
    );

    manager.connect(&credential(TOKEN)).await.unwrap();
    assert!(manager.is_connected());
    assert_eq!(manager.subscriptions().len(), 4);

    eventually(|| !received.lock().unwrap().is_empty()).await;
    assert_eq!(received.lock().unwrap()[0], NotificationEvent::UnreadCountUpdated(3));

    manager.disconnect().await;
    assert_eq!(manager.status(), ConnectionStatus::default());
}

#[tokio::test]
async fn test_socket_upgrade_rejection_is_unauthorized() {
    let addr = serve().await;
    let manager = SocketConnectionManager::new(
        SocketManagerConfig::new(format!("ws://{}/ws", addr)),
        Arc::new(TungsteniteConnector::new()),
        Arc::new(EventDispatcher::new()),
    );

    let err = manager.connect(&credential("wrong")).await.unwrap_err();

    assert!(matches!(err, ConnectionError::Unauthorized(_)));
    assert!(!manager.status().retry_pending);
}

// =============================================================================
// Stream
// =============================================================================

#[tokio::test]
async fn test_stream_manager_over_sse() {
    let addr = serve().await;
    let dispatcher = EventDispatcher::new();
    let received = recording(&dispatcher, EventKind::NewNotification);
    let manager = StreamConnectionManager::new(
        StreamManagerConfig::new(format!("http://{}/notifications/stream", addr)),
        Arc::new(EventSourceConnector::new()),
        Arc::new(dispatcher.clone()),
    );

    manager.connect(&credential(TOKEN)).await.unwrap();
    assert!(manager.is_connected());

    eventually(|| !received.lock().unwrap().is_empty()).await;
    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert!(matches!(&received[0], NotificationEvent::NewNotification(n) if n.id.value() == 42 && n.title == "X"));
    drop(received);

    manager.disconnect().await;
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn test_stream_rejection_is_unauthorized() {
    let addr = serve().await;
    let manager = StreamConnectionManager::new(
        StreamManagerConfig::new(format!("http://{}/notifications/stream", addr)),
        Arc::new(EventSourceConnector::new()),
        Arc::new(EventDispatcher::new()),
    );

    let err = manager.connect(&credential("wrong")).await.unwrap_err();

    assert!(matches!(err, ConnectionError::Unauthorized(_)));
    assert!(manager.status().is_terminal());
}
