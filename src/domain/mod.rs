//! Domain layer: transport-independent types and rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, credential, timestamp, errors)
//! - `notification` - Notification record, event union and message codec
//! - `connection` - Connection state, reconnection policy and failure taxonomy

pub mod connection;
pub mod foundation;
pub mod notification;
