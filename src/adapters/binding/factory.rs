//! Manager factories used by the hub.

use std::sync::Arc;

use crate::adapters::socket::{SocketConnectionManager, SocketManagerConfig};
use crate::adapters::stream::{StreamConnectionManager, StreamManagerConfig};
use crate::ports::{
    ConnectionManager, EventPublisher, LivenessSignal, SocketConnector, StreamConnector,
};

/// Builds one connection manager per credential.
///
/// Called from within the runtime, so factories may spawn tasks.
pub trait ManagerFactory: Send + Sync {
    fn create(&self, publisher: Arc<dyn EventPublisher>) -> Arc<dyn ConnectionManager>;
}

/// Persistent socket managers.
pub struct SocketManagerFactory {
    config: SocketManagerConfig,
    connector: Arc<dyn SocketConnector>,
}

impl SocketManagerFactory {
    pub fn new(config: SocketManagerConfig, connector: Arc<dyn SocketConnector>) -> Self {
        Self { config, connector }
    }
}

impl ManagerFactory for SocketManagerFactory {
    fn create(&self, publisher: Arc<dyn EventPublisher>) -> Arc<dyn ConnectionManager> {
        Arc::new(SocketConnectionManager::new(
            self.config.clone(),
            Arc::clone(&self.connector),
            publisher,
        ))
    }
}

/// Push stream managers, optionally wired to a liveness signal.
pub struct StreamManagerFactory {
    config: StreamManagerConfig,
    connector: Arc<dyn StreamConnector>,
    liveness: Option<Arc<dyn LivenessSignal>>,
}

impl StreamManagerFactory {
    pub fn new(config: StreamManagerConfig, connector: Arc<dyn StreamConnector>) -> Self {
        Self {
            config,
            connector,
            liveness: None,
        }
    }

    pub fn with_liveness(mut self, signal: Arc<dyn LivenessSignal>) -> Self {
        self.liveness = Some(signal);
        self
    }
}

impl ManagerFactory for StreamManagerFactory {
    fn create(&self, publisher: Arc<dyn EventPublisher>) -> Arc<dyn ConnectionManager> {
        let manager = StreamConnectionManager::new(
            self.config.clone(),
            Arc::clone(&self.connector),
            publisher,
        );
        match &self.liveness {
            Some(signal) => Arc::new(manager.with_liveness(signal.as_ref())),
            None => Arc::new(manager),
        }
    }
}
