//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the notification core to external systems:
//! - `socket` - Persistent multiplexed socket (STOMP over WebSocket)
//! - `stream` - One-directional push stream (Server-Sent Events)
//! - `events` - In-process event dispatcher
//! - `http` - REST client for the read side
//! - `liveness` - Host visibility signals
//! - `binding` - Connection sharing and UI surfaces

pub mod binding;
pub mod events;
pub mod http;
pub mod liveness;
pub mod socket;
pub mod stream;
