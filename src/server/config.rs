//! Relay server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use super::broadcaster::DEFAULT_BROADCAST_INTERVAL;
use super::registry::DEFAULT_QUEUE_CAPACITY;
use crate::adapters::DEFAULT_STORE_TIMEOUT;
use crate::error::{MetricastError, MetricastResult};

/// Port the relay listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 6001;

/// Configuration for the relay server.
///
/// # Example
///
/// ```ignore
/// use metricast::server::ServerConfig;
///
/// let config = ServerConfig::default()
///     .with_store_url("http://db-gateway:8080/latest")
///     .with_broadcast_interval(Duration::from_millis(500));
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Upstream "latest row" endpoint. Required by `metricast serve`;
    /// embedders leaving it `None` pass their own store to `start_relay`.
    pub store_url: Option<String>,
    pub store_timeout: Duration,
    pub broadcast_interval: Duration,
    /// Allowed CORS origin; `None` allows any.
    pub cors_origin: Option<String>,
    /// Depth of each subscriber's outbound queue.
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            store_url: None,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
            cors_origin: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_store_url(mut self, url: impl Into<String>) -> Self {
        self.store_url = Some(url.into());
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_broadcast_interval(mut self, interval: Duration) -> Self {
        self.broadcast_interval = interval;
        self
    }

    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = Some(origin.into());
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Build config from the process environment.
    ///
    /// - `METRICAST_BIND`: full socket address, e.g. `127.0.0.1:6001`
    /// - `WEBSOCKET_PORT`: port only, bound on all interfaces
    /// - `METRICAST_STORE_URL`: upstream latest-row endpoint
    /// - `METRICAST_INTERVAL_MS`: broadcast period
    /// - `CORS_ORIGIN`: allowed origin
    pub fn from_env() -> MetricastResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> MetricastResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(bind) = get("METRICAST_BIND") {
            config.bind_addr = bind.trim().parse().map_err(|e| {
                MetricastError::config(format!("METRICAST_BIND '{}': {}", bind, e))
            })?;
        } else if let Some(port) = get("WEBSOCKET_PORT") {
            let port: u16 = port.trim().parse().map_err(|e| {
                MetricastError::config(format!("WEBSOCKET_PORT '{}': {}", port, e))
            })?;
            config.bind_addr.set_port(port);
        }

        if let Some(url) = get("METRICAST_STORE_URL") {
            config.store_url = Some(url);
        }

        if let Some(ms) = get("METRICAST_INTERVAL_MS") {
            let ms: u64 = ms.trim().parse().map_err(|e| {
                MetricastError::config(format!("METRICAST_INTERVAL_MS '{}': {}", ms, e))
            })?;
            if ms == 0 {
                return Err(MetricastError::config(
                    "METRICAST_INTERVAL_MS must be greater than zero",
                ));
            }
            config.broadcast_interval = Duration::from_millis(ms);
        }

        if let Some(origin) = get("CORS_ORIGIN") {
            config.cors_origin = Some(origin);
        }

        Ok(config)
    }
}
