//! Event dispatch adapters.
//!
//! - `EventDispatcher` - Synchronous, in-process fan-out from one connection
//!   to the surfaces bound to it

mod dispatcher;

pub use dispatcher::EventDispatcher;
