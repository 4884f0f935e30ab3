//! Connection lifecycle vocabulary shared by both transports.
//!
//! - `state` - Connection state and the published status snapshot
//! - `retry` - Reconnection policy and retry counter
//! - `error` - Connection failure taxonomy

mod error;
mod retry;
mod state;

pub use error::ConnectionError;
pub use retry::{Backoff, ReconnectPolicy, RetryCounter, RetryDecision};
pub use state::{ConnectionState, ConnectionStatus};
