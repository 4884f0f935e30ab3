//! Mount/unmount lifecycle for UI surfaces.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::connection::{ConnectionError, ConnectionStatus};
use crate::domain::foundation::Credential;
use crate::domain::notification::EventKind;
use crate::ports::{EventListener, EventSubscriber, Registration};

use super::{ConnectionHub, ConnectionLease};

/// Listeners a surface wants registered, one entry per kind.
pub type SurfaceListeners = Vec<(EventKind, Arc<dyn EventListener>)>;

/// A mounted surface: one lease plus its registrations.
///
/// Dropping the binding unregisters and releases, same as `unmount`.
pub struct SurfaceBinding {
    name: String,
    lease: Option<ConnectionLease>,
    registrations: Vec<Registration>,
    tasks: Vec<JoinHandle<()>>,
}

impl SurfaceBinding {
    /// Acquires a lease for `credential` and registers `listeners` on its
    /// dispatcher.
    pub async fn mount(
        hub: &Arc<ConnectionHub>,
        credential: &Credential,
        name: impl Into<String>,
        listeners: SurfaceListeners,
    ) -> Result<Self, ConnectionError> {
        let name = name.into();
        let lease = hub.acquire(credential).await?;
        let registrations = listeners
            .into_iter()
            .map(|(kind, listener)| lease.dispatcher().register(kind, listener))
            .collect::<Vec<_>>();

        tracing::debug!(surface = %name, listeners = registrations.len(), "Surface mounted");
        Ok(Self {
            name,
            lease: Some(lease),
            registrations,
            tasks: Vec::new(),
        })
    }

    /// Ties a background task to the binding; it is aborted on unmount.
    pub fn attach(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying lease. `None` only while unmounting.
    pub fn lease(&self) -> Option<&ConnectionLease> {
        self.lease.as_ref()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.lease
            .as_ref()
            .map(ConnectionLease::status)
            .unwrap_or_default()
    }

    /// Unregisters every listener and releases the lease.
    pub async fn unmount(mut self) {
        self.detach();
        if let Some(lease) = self.lease.take() {
            lease.release().await;
        }
        tracing::debug!(surface = %self.name, "Surface unmounted");
    }

    fn detach(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        for registration in self.registrations.drain(..) {
            registration.unregister();
        }
    }
}

impl Drop for SurfaceBinding {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Runs `f` now if connected, and again every time the connection
/// re-enters `Connected`.
///
/// Push messages sent while disconnected are lost, so surfaces re-derive
/// their state from the REST API at these points.
pub fn spawn_on_connected<F, Fut>(mut status: watch::Receiver<ConnectionStatus>, f: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut was_connected = false;
        loop {
            let connected = status.borrow_and_update().is_connected();
            if connected && !was_connected {
                f().await;
            }
            was_connected = connected;
            if status.changed().await.is_err() {
                break;
            }
        }
    })
}
