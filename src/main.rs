//! Seedlab Notify - headless notification listener
//!
//! Connects with the configured credential, logs every new notification as
//! a toast and tracks the unread count until Ctrl-C.

use std::sync::Arc;

use seedlab_notify::adapters::binding::{
    ConnectionHub, ConnectionIndicator, ManagerFactory, SocketManagerFactory,
    StreamManagerFactory, SurfaceBinding, ToastLayer, TracingToastSink, UnreadBadge,
};
use seedlab_notify::adapters::http::{HttpNotificationApi, HttpNotificationApiConfig};
use seedlab_notify::adapters::socket::TungsteniteConnector;
use seedlab_notify::adapters::stream::EventSourceConnector;
use seedlab_notify::config::{AppConfig, LogFormat, TransportKind};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let credential = config.auth.credential()?;
    tracing::info!(
        user = %credential.subject(),
        transport = ?config.transport,
        base_url = %config.api.base(),
        "Starting notification listener"
    );

    let factory: Arc<dyn ManagerFactory> = match config.transport {
        TransportKind::Socket => Arc::new(SocketManagerFactory::new(
            config.socket.manager_config(config.api.socket_url()),
            Arc::new(TungsteniteConnector::new()),
        )),
        TransportKind::Stream => Arc::new(StreamManagerFactory::new(
            config.stream.manager_config(config.api.stream_url()),
            Arc::new(EventSourceConnector::new()),
        )),
    };
    let hub = ConnectionHub::new(factory);
    if ConnectionHub::install_global(Arc::clone(&hub)).is_err() {
        tracing::warn!("Connection hub already installed");
    }

    let api = Arc::new(HttpNotificationApi::new(
        HttpNotificationApiConfig::new(config.api.base()).with_timeout(config.api.request_timeout()),
    )?);
    let badge = Arc::new(UnreadBadge::new());
    let toasts = Arc::new(ToastLayer::new(Arc::new(TracingToastSink)));

    let mut listeners = badge.listeners();
    listeners.extend(toasts.listeners());
    let mut binding = SurfaceBinding::mount(&hub, &credential, "listener", listeners).await?;

    if let Some(status) = binding.lease().map(|lease| lease.watch_status()) {
        binding.attach(badge.refresh_on_connect(status.clone(), api, credential.clone()));
        binding.attach(tokio::spawn(report(ConnectionIndicator::new(status), Arc::clone(&badge))));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!(unread = badge.count(), "Shutting down");
    binding.unmount().await;
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.logging.env_filter())
        .with_target(false);
    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Logs indicator transitions and unread count changes.
async fn report(mut indicator: ConnectionIndicator, badge: Arc<UnreadBadge>) {
    let mut unread = badge.watch();
    loop {
        tokio::select! {
            state = indicator.changed() => match state {
                Some(state) if indicator.offers_reconnect() => {
                    tracing::warn!(%state, "Connection offline, automatic retries stopped");
                }
                Some(state) => tracing::info!(%state, "Connection state"),
                None => break,
            },
            changed = unread.changed() => {
                if changed.is_err() {
                    break;
                }
                let count = *unread.borrow_and_update();
                tracing::info!(count, "Unread notifications");
            }
        }
    }
}
