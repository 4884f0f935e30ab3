//! Notification vocabulary: the record, the event union and the codec
//! that turns wire payloads into events.

pub mod codec;
mod event;
mod record;

pub use codec::{Channel, DecodeError};
pub use event::{EventKind, NotificationEvent};
pub use record::{Notification, NotificationCategory, RelatedEntity};
