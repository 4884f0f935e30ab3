//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the notification core and the outside world. Adapters implement these
//! ports.
//!
//! ## Event Ports
//!
//! - `EventPublisher` - Emits decoded events to listeners
//! - `EventSubscriber` - Registers listeners per event kind
//!
//! ## Transport Ports
//!
//! - `SocketConnector` - Opens the persistent multiplexed socket
//! - `StreamConnector` - Opens the one-directional push stream
//! - `ConnectionManager` - Lifecycle contract shared by both transports
//! - `LivenessSignal` - Host visibility hint for immediate reconnects
//!
//! ## Surface Ports
//!
//! - `NotificationApi` - Unread count and recent list for self-healing
//! - `ToastSink` - User-facing alerts

mod connection_manager;
mod event_publisher;
mod event_subscriber;
mod liveness_signal;
mod notification_api;
mod socket_transport;
mod stream_transport;
mod toast_sink;
mod transport_error;

pub use connection_manager::ConnectionManager;
pub use event_publisher::EventPublisher;
pub use event_subscriber::{
    EventBus, EventListener, EventSubscriber, FnListener, ListenerError, Registration,
};
pub use liveness_signal::{LivenessSignal, Visibility};
pub use notification_api::NotificationApi;
pub use socket_transport::{SocketConnector, SocketInbound, SocketLink, SocketSink};
pub use stream_transport::{SseEvent, SseStream, StreamConnector};
pub use toast_sink::{Toast, ToastLevel, ToastSink};
pub use transport_error::TransportError;
