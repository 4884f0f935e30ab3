//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, credentials and error types
//! that form the vocabulary of the notification client.

mod auth;
mod errors;
mod ids;
mod timestamp;

pub use auth::{Credential, CredentialFingerprint};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{NotificationId, UserId};
pub use timestamp::Timestamp;
