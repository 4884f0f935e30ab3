//! Connection indicator.

use std::fmt;

use tokio::sync::watch;

use crate::domain::connection::{ConnectionState, ConnectionStatus};

/// What the indicator shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    /// Connected.
    Live,
    /// Connecting, or a reconnect is scheduled.
    Recovering,
    /// Nothing will happen on its own.
    Offline,
}

impl IndicatorState {
    pub fn from_status(status: &ConnectionStatus) -> Self {
        match status.state {
            ConnectionState::Connected => IndicatorState::Live,
            ConnectionState::Connecting => IndicatorState::Recovering,
            ConnectionState::Disconnected if status.retry_pending => IndicatorState::Recovering,
            ConnectionState::Disconnected => IndicatorState::Offline,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IndicatorState::Live => "live",
            IndicatorState::Recovering => "reconnecting",
            IndicatorState::Offline => "offline",
        }
    }
}

impl fmt::Display for IndicatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Observes one connection's status.
#[derive(Debug, Clone)]
pub struct ConnectionIndicator {
    status: watch::Receiver<ConnectionStatus>,
}

impl ConnectionIndicator {
    pub fn new(status: watch::Receiver<ConnectionStatus>) -> Self {
        Self { status }
    }

    pub fn state(&self) -> IndicatorState {
        IndicatorState::from_status(&self.status.borrow())
    }

    /// Only a terminal failure (retries exhausted or credential rejected)
    /// offers the manual reconnect.
    pub fn offers_reconnect(&self) -> bool {
        self.status.borrow().is_terminal()
    }

    /// Waits for the next change of displayed state. `None` once the
    /// manager is gone.
    pub async fn changed(&mut self) -> Option<IndicatorState> {
        let current = self.state();
        loop {
            self.status.changed().await.ok()?;
            let next = IndicatorState::from_status(&self.status.borrow_and_update());
            if next != current {
                return Some(next);
            }
        }
    }
}
