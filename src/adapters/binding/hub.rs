//! Process-wide registry of live connections.
//!
//! Every surface that needs push events acquires a [`ConnectionLease`] for
//! its credential. Leases for the same credential share one manager and one
//! dispatcher, so no credential ever holds two connections.
//!
//! ```text
//! badge ──┐
//! toasts ─┼─ acquire(cred) ──► Entry { manager, dispatcher, leases: 3 }
//! feed ───┘
//!          release() ... release() ... release() ──► leases: 0 ──► disconnect()
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::OnceCell;
use tokio::sync::watch;

use crate::adapters::events::EventDispatcher;
use crate::domain::connection::{ConnectionError, ConnectionStatus};
use crate::domain::foundation::{Credential, CredentialFingerprint};
use crate::ports::ConnectionManager;

use super::ManagerFactory;

static GLOBAL_HUB: OnceCell<Arc<ConnectionHub>> = OnceCell::new();

/// Shares connection managers between surfaces.
pub struct ConnectionHub {
    factory: Arc<dyn ManagerFactory>,
    entries: Mutex<HashMap<CredentialFingerprint, Entry>>,
}

struct Entry {
    manager: Arc<dyn ConnectionManager>,
    dispatcher: EventDispatcher,
    leases: usize,
    /// Set while the last lease's disconnect is running; flips to `true`
    /// once the entry is gone.
    closing: Option<watch::Receiver<bool>>,
}

enum Slot {
    Leased {
        manager: Arc<dyn ConnectionManager>,
        dispatcher: EventDispatcher,
        created: bool,
    },
    Closing(watch::Receiver<bool>),
}

impl ConnectionHub {
    pub fn new(factory: Arc<dyn ManagerFactory>) -> Arc<Self> {
        Arc::new(Self {
            factory,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Installs the process-wide hub. Returns the rejected hub if one is
    /// already installed.
    pub fn install_global(hub: Arc<ConnectionHub>) -> Result<(), Arc<ConnectionHub>> {
        GLOBAL_HUB.set(hub)
    }

    /// The process-wide hub, if installed.
    pub fn global() -> Option<Arc<ConnectionHub>> {
        GLOBAL_HUB.get().cloned()
    }

    /// Leases the connection for `credential` and makes sure it is up.
    ///
    /// A new entry is created and connected when no other lease holds it.
    /// A shared entry whose manager has gone idle (exhausted or rejected)
    /// is connected again. An entry still closing is waited for.
    ///
    /// A rejected credential rolls the acquisition back. Any other connect
    /// failure still yields a lease: the manager is retrying and its status
    /// tells the story.
    pub async fn acquire(
        self: &Arc<Self>,
        credential: &Credential,
    ) -> Result<ConnectionLease, ConnectionError> {
        let fingerprint = credential.fingerprint().clone();

        let (manager, dispatcher, created) = loop {
            match self.lease_slot(&fingerprint) {
                Slot::Leased {
                    manager,
                    dispatcher,
                    created,
                } => break (manager, dispatcher, created),
                Slot::Closing(mut closed) => {
                    tracing::debug!(credential = %fingerprint, "Waiting for previous connection to close");
                    // A dropped sender means the entry is already gone
                    let _ = closed.wait_for(|closed| *closed).await;
                }
            }
        };

        let lease = ConnectionLease {
            hub: Arc::clone(self),
            fingerprint,
            credential: credential.clone(),
            manager,
            dispatcher,
            released: false,
        };

        if created {
            tracing::info!(
                user = %credential.subject(),
                credential = %lease.fingerprint,
                transport = lease.manager.transport(),
                "Opening shared connection"
            );
        } else {
            let status = lease.manager.status();
            if !status.is_idle() {
                tracing::debug!(credential = %lease.fingerprint, "Reusing shared connection");
                return Ok(lease);
            }
            tracing::info!(
                credential = %lease.fingerprint,
                error = ?status.error,
                "Shared connection idle, connecting again"
            );
        }

        match lease.manager.connect(credential).await {
            Ok(()) => Ok(lease),
            Err(err @ ConnectionError::Unauthorized(_)) => {
                lease.release().await;
                Err(err)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Connect failed, manager keeps retrying");
                Ok(lease)
            }
        }
    }

    /// Number of distinct credentials with a live entry.
    pub fn connection_count(&self) -> usize {
        self.lock().len()
    }

    /// Outstanding leases for `credential`.
    pub fn lease_count(&self, credential: &Credential) -> usize {
        self.lock()
            .get(credential.fingerprint())
            .map_or(0, |entry| entry.leases)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CredentialFingerprint, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes one lease on the entry for `fingerprint`, creating it if absent.
    fn lease_slot(&self, fingerprint: &CredentialFingerprint) -> Slot {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(fingerprint) {
            if let Some(closed) = &entry.closing {
                return Slot::Closing(closed.clone());
            }
            entry.leases += 1;
            return Slot::Leased {
                manager: Arc::clone(&entry.manager),
                dispatcher: entry.dispatcher.clone(),
                created: false,
            };
        }

        let dispatcher = EventDispatcher::new();
        let manager = self.factory.create(Arc::new(dispatcher.clone()));
        entries.insert(
            fingerprint.clone(),
            Entry {
                manager: Arc::clone(&manager),
                dispatcher: dispatcher.clone(),
                leases: 1,
                closing: None,
            },
        );
        Slot::Leased {
            manager,
            dispatcher,
            created: true,
        }
    }

    /// Drops one lease. When it was the last, marks the entry closing and
    /// hands back the manager with a guard that removes the entry on drop.
    fn release_one(
        self: &Arc<Self>,
        fingerprint: &CredentialFingerprint,
    ) -> Option<(Arc<dyn ConnectionManager>, ClosingGuard)> {
        let mut entries = self.lock();
        let entry = entries.get_mut(fingerprint)?;
        if entry.closing.is_some() {
            return None;
        }
        entry.leases = entry.leases.saturating_sub(1);
        if entry.leases > 0 {
            return None;
        }
        let (closed, rx) = watch::channel(false);
        entry.closing = Some(rx);
        let guard = ClosingGuard {
            hub: Arc::clone(self),
            fingerprint: fingerprint.clone(),
            closed,
        };
        Some((Arc::clone(&entry.manager), guard))
    }
}

/// Removes a closing entry and wakes waiting acquirers when dropped.
struct ClosingGuard {
    hub: Arc<ConnectionHub>,
    fingerprint: CredentialFingerprint,
    closed: watch::Sender<bool>,
}

impl Drop for ClosingGuard {
    fn drop(&mut self) {
        {
            let mut entries = self.hub.lock();
            if entries
                .get(&self.fingerprint)
                .is_some_and(|entry| entry.closing.is_some())
            {
                entries.remove(&self.fingerprint);
            }
        }
        self.closed.send_replace(true);
    }
}

/// One holder's share of a connection.
///
/// Call [`release`](Self::release) to give it back. Dropping an unreleased
/// lease releases it too, finishing the disconnect on the current runtime.
pub struct ConnectionLease {
    hub: Arc<ConnectionHub>,
    fingerprint: CredentialFingerprint,
    credential: Credential,
    manager: Arc<dyn ConnectionManager>,
    dispatcher: EventDispatcher,
    released: bool,
}

impl ConnectionLease {
    /// Gives the lease back; the last one disconnects.
    pub async fn release(mut self) {
        self.released = true;
        if let Some((manager, closing)) = self.hub.release_one(&self.fingerprint) {
            manager.disconnect().await;
            drop(closing);
            tracing::info!(credential = %self.fingerprint, "Closed shared connection");
        }
    }

    /// Forces a fresh `connect()`, e.g. from the indicator's reconnect
    /// affordance after the policy gave up.
    pub async fn reconnect(&self) -> Result<(), ConnectionError> {
        tracing::info!(credential = %self.fingerprint, "Manual reconnect");
        self.manager.connect(&self.credential).await
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn manager(&self) -> &Arc<dyn ConnectionManager> {
        &self.manager
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn status(&self) -> ConnectionStatus {
        self.manager.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.manager.watch_status()
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Some((manager, closing)) = self.hub.release_one(&self.fingerprint) else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    manager.disconnect().await;
                    drop(closing);
                });
            }
            // Without a runtime the manager's own drop aborts its tasks
            Err(_) => {
                drop(manager);
                drop(closing);
            }
        }
    }
}

impl std::fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("credential", &self.fingerprint)
            .field("transport", &self.manager.transport())
            .finish()
    }
}
