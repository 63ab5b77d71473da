//! Relay server: broadcaster, subscriber registry and HTTP surface.
//!
//! [`start_relay`] binds the listener, spawns the broadcaster and serves the
//! router until [`RunningRelay::shutdown`] is called.

pub mod broadcaster;
pub mod config;
pub mod registry;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use broadcaster::{Broadcaster, BroadcasterHandle, TickOutcome, DEFAULT_BROADCAST_INTERVAL};
pub use config::{ServerConfig, DEFAULT_PORT};
pub use registry::{
    ConnectionId, ConnectionRegistry, DeliveryReport, Subscriber, DEFAULT_QUEUE_CAPACITY,
};
pub use routes::{router, RelayState, API_LATEST_PATH};

use crate::adapters::HttpMetricsStore;
use crate::error::MetricastResult;
use crate::traits::MetricsAccessor;

/// How long shutdown waits for the HTTP server to drain.
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Store described by `config`: the upstream HTTP endpoint if one is set.
pub fn store_from_config(config: &ServerConfig) -> Option<Arc<dyn MetricsAccessor>> {
    config.store_url.as_ref().map(|url| {
        Arc::new(HttpMetricsStore::with_timeout(url.clone(), config.store_timeout))
            as Arc<dyn MetricsAccessor>
    })
}

/// A relay bound to a local address.
pub struct RunningRelay {
    local_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    broadcaster: BroadcasterHandle,
    stop_tx: watch::Sender<bool>,
    server: JoinHandle<()>,
}

impl RunningRelay {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Stop ticking, drop every subscriber, then stop serving.
    pub async fn shutdown(self) {
        info!("Relay shutting down");
        self.broadcaster.shutdown().await;
        self.registry.shutdown().await;
        self.stop_tx.send_replace(true);

        let mut server = self.server;
        if tokio::time::timeout(SERVER_DRAIN_TIMEOUT, &mut server)
            .await
            .is_err()
        {
            warn!("Relay server did not drain in time, aborting");
            server.abort();
        }
        info!("Relay stopped");
    }
}

/// Start the relay on `config.bind_addr`.
///
/// Bind to port 0 to get an ephemeral port; see [`RunningRelay::local_addr`].
pub async fn start_relay(
    config: &ServerConfig,
    store: Arc<dyn MetricsAccessor>,
) -> MetricastResult<RunningRelay> {
    let registry = Arc::new(ConnectionRegistry::with_queue_capacity(config.queue_capacity));
    let broadcaster = Arc::new(
        Broadcaster::new(store, registry.clone()).with_interval(config.broadcast_interval),
    );

    let app = router(
        RelayState {
            broadcaster: broadcaster.clone(),
            registry: registry.clone(),
        },
        config.cors_origin.as_deref(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "Relay listening on http://{}", local_addr);

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = tokio::spawn(async move {
        let shutdown = async move {
            while !*stop_rx.borrow() {
                if stop_rx.changed().await.is_err() {
                    break;
                }
            }
        };
        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        {
            tracing::error!(error = %e, "Relay server error");
        }
    });

    let broadcaster = broadcaster.spawn();

    Ok(RunningRelay {
        local_addr,
        registry,
        broadcaster,
        stop_tx,
        server,
    })
}
