//! Liveness signal adapters.
//!
//! - `ManualLivenessSignal` - Host code reports visibility explicitly
//! - `NoLivenessSignal` - Hosts without a foreground notion

use tokio::sync::watch;

use crate::ports::{LivenessSignal, Visibility};

/// Visibility reported by host code, e.g. from window focus events.
#[derive(Debug)]
pub struct ManualLivenessSignal {
    tx: watch::Sender<Visibility>,
}

impl Default for ManualLivenessSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualLivenessSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Visibility::Visible);
        Self { tx }
    }

    /// Reports the host in the foreground. Every report notifies, even
    /// without a preceding `set_hidden`.
    pub fn set_visible(&self) {
        self.set(Visibility::Visible);
    }

    pub fn set_hidden(&self) {
        self.set(Visibility::Hidden);
    }

    pub fn set(&self, visibility: Visibility) {
        tracing::debug!(?visibility, "Host visibility reported");
        self.tx.send_replace(visibility);
    }

    /// Last reported visibility.
    pub fn visibility(&self) -> Visibility {
        *self.tx.borrow()
    }
}

impl LivenessSignal for ManualLivenessSignal {
    fn subscribe(&self) -> watch::Receiver<Visibility> {
        self.tx.subscribe()
    }
}

/// Signal that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLivenessSignal;

impl LivenessSignal for NoLivenessSignal {
    fn subscribe(&self) -> watch::Receiver<Visibility> {
        let (_, rx) = watch::channel(Visibility::Visible);
        rx
    }
}
