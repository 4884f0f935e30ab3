//! EventPublisher port - Interface for fanning decoded events out to listeners.
//!
//! Connection managers publish through this port without knowing who is
//! listening or how listeners are stored.

use crate::domain::notification::NotificationEvent;

/// Port for emitting notification events.
///
/// Implementations must ensure:
/// - Every listener registered for `event.kind()` at emission time is invoked
/// - A failing listener does not prevent delivery to the others
/// - Emission is synchronous; when `emit` returns, delivery is complete
pub trait EventPublisher: Send + Sync {
    /// Deliver one event. Returns how many listeners handled it successfully.
    fn emit(&self, event: &NotificationEvent) -> usize;
}
