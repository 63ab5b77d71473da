//! Periodic fan-out of the latest sample.
//!
//! Each tick reads the store, normalizes the row and pushes one
//! `metrics-update` to every registered subscriber. Ticks are best effort:
//! a failed read or a malformed row skips the tick, nothing is queued for
//! later.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::registry::{ConnectionRegistry, DeliveryReport};
use crate::error::{MetricastError, StoreError};
use crate::models::Sample;
use crate::normalize;
use crate::traits::MetricsAccessor;
use crate::websocket::PushEvent;

/// Default broadcast period.
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(1);

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The store could not be read.
    StoreUnavailable,
    /// The store has no row yet.
    NoData,
    /// The row could not be normalized.
    Malformed,
    /// An update was pushed to a registry snapshot.
    Delivered(DeliveryReport),
}

pub struct Broadcaster {
    store: Arc<dyn MetricsAccessor>,
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
}

impl Broadcaster {
    pub fn new(store: Arc<dyn MetricsAccessor>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            store,
            registry,
            interval: DEFAULT_BROADCAST_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Latest normalized sample.
    ///
    /// `Ok(None)` when the store has no row, or the row is malformed.
    pub async fn latest_sample(&self) -> Result<Option<Sample>, StoreError> {
        let Some(raw) = self.store.latest().await? else {
            return Ok(None);
        };
        match normalize::normalize(&raw) {
            Ok(sample) => Ok(Some(sample)),
            Err(e) => {
                warn!(error = %e, "Latest row is malformed");
                Ok(None)
            }
        }
    }

    /// Sample handed to a new subscriber as `initial-data`.
    ///
    /// Store failures degrade to `None`; a new subscriber is never refused
    /// because the store is down.
    pub async fn snapshot(&self) -> Option<Sample> {
        match self.latest_sample().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Store unavailable for initial data");
                None
            }
        }
    }

    /// Run one broadcast tick.
    pub async fn tick(&self) -> TickOutcome {
        let raw = match self.store.latest().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No metrics in store yet, skipping tick");
                return TickOutcome::NoData;
            }
            Err(e) => {
                let e = MetricastError::from(e);
                warn!(
                    error = %e,
                    code = e.error_code(),
                    category = %e.category(),
                    retryable = e.is_retryable(),
                    "Store unavailable, skipping tick"
                );
                return TickOutcome::StoreUnavailable;
            }
        };

        let sample = match normalize::normalize(&raw) {
            Ok(sample) => sample,
            Err(e) => {
                let e = MetricastError::from(e);
                warn!(
                    error = %e,
                    code = e.error_code(),
                    category = %e.category(),
                    "Malformed sample, skipping tick"
                );
                return TickOutcome::Malformed;
            }
        };

        let report = self.registry.broadcast(&PushEvent::update(sample)).await;
        debug!(
            delivered = report.delivered,
            dropped = report.dropped.len(),
            "Broadcast tick"
        );
        TickOutcome::Delivered(report)
    }

    /// Tick until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = self.interval.as_millis() as u64, "Broadcaster started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Broadcaster stopped");
    }

    /// Start the loop on its own task.
    pub fn spawn(self: Arc<Self>) -> BroadcasterHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        BroadcasterHandle {
            shutdown_tx,
            task: Mutex::new(Some(task)),
        }
    }
}

/// Handle to a running broadcaster.
pub struct BroadcasterHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BroadcasterHandle {
    /// Stop the loop and wait for it to finish. Idempotent.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Broadcaster task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !*self.shutdown_tx.borrow()
    }
}
