//! LivenessSignal port - Host hint that the user is back.
//!
//! A browser host maps page visibility onto this; a desktop host may map
//! window focus or network-up notifications. Hosts without such a signal
//! use a receiver whose sender is already gone.

use tokio::sync::watch;

/// Foreground state reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Port for observing host visibility.
pub trait LivenessSignal: Send + Sync {
    /// Receiver notified on every visibility report.
    fn subscribe(&self) -> watch::Receiver<Visibility>;
}
