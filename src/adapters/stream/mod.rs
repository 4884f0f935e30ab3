//! Push stream transport (Server-Sent Events).
//!
//! - `StreamConnectionManager` - Lifecycle, linear reconnects and liveness
//! - `EventSourceConnector` - Production connector on reqwest
//! - `MockStreamConnector` - Scriptable connector for tests

mod eventsource;
mod manager;
mod mock;

pub use eventsource::EventSourceConnector;
pub use manager::{StreamConnectionManager, StreamManagerConfig};
pub use mock::{MockStreamConnector, MockStreamOutcome};
