//! Persistent socket transport.
//!
//! A framed pub/sub protocol (STOMP 1.2) over a WebSocket:
//!
//! - `frame` - Text frame codec and heart-beat negotiation
//! - `SocketConnectionManager` - Connection lifecycle, subscriptions, retry
//! - `TungsteniteConnector` - Production WebSocket connector
//! - `MockSocketConnector` - In-memory broker for tests

pub mod frame;
mod manager;
mod mock;
mod ws_connector;

pub use manager::{SocketConnectionManager, SocketManagerConfig, Subscription};
pub use mock::{ConnectCall, MockSocketConnector, MockSocketOutcome};
pub use ws_connector::TungsteniteConnector;
