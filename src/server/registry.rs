//! Live subscriber registry.
//!
//! Each subscriber owns a bounded outbound queue drained by its socket task.
//! The registry only enqueues, never writes to sockets, so one slow client
//! can't stall a broadcast for the others.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::Sample;
use crate::websocket::PushEvent;

/// Default depth of each subscriber's outbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

pub type ConnectionId = Uuid;

/// One live subscriber connection.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: ConnectionId,
    pub peer: Option<SocketAddr>,
    pub connected_at: DateTime<Utc>,
    tx: mpsc::Sender<PushEvent>,
}

impl Subscriber {
    /// Non-blocking enqueue.
    fn offer(&self, event: PushEvent) -> Result<(), mpsc::error::TrySendError<PushEvent>> {
        self.tx.try_send(event)
    }
}

/// Result of pushing one event to a registry snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: Vec<ConnectionId>,
}

/// Registry of live subscribers.
pub struct ConnectionRegistry {
    subscribers: RwLock<HashMap<ConnectionId, Subscriber>>,
    queue_capacity: usize,
    closed: AtomicBool,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a subscriber and the receiving end of its queue.
    ///
    /// The subscriber is not yet registered.
    pub fn open(&self, peer: Option<SocketAddr>) -> (Subscriber, mpsc::Receiver<PushEvent>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            peer,
            connected_at: Utc::now(),
            tx,
        };
        (subscriber, rx)
    }

    /// Register a subscriber, delivering `initial-data` first.
    ///
    /// The initial event is enqueued before the subscriber is visible to
    /// [`ConnectionRegistry::snapshot`], so it always precedes any
    /// `metrics-update`. Returns false if the registry is shut down or the
    /// subscriber's queue is already gone.
    pub async fn register(&self, subscriber: Subscriber, initial: Option<Sample>) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            debug!(connection_id = %subscriber.id, "Registry closed, refusing subscriber");
            return false;
        }
        if let Err(e) = subscriber.offer(PushEvent::initial(initial)) {
            warn!(connection_id = %subscriber.id, error = %e, "Could not queue initial data");
            return false;
        }

        let mut subscribers = self.subscribers.write().await;
        // Re-check under the lock so a concurrent shutdown can't miss us.
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        info!(
            connection_id = %subscriber.id,
            peer = ?subscriber.peer,
            live = subscribers.len() + 1,
            "Subscriber registered"
        );
        subscribers.insert(subscriber.id, subscriber);
        true
    }

    /// Remove a subscriber. Returns whether it was present.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.subscribers.write().await.remove(&id).is_some();
        if removed {
            debug!(connection_id = %id, "Subscriber unregistered");
        }
        removed
    }

    /// Membership at this instant.
    pub async fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.read().await.values().cloned().collect()
    }

    /// Visit every subscriber in a snapshot.
    pub async fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Subscriber),
    {
        for subscriber in self.snapshot().await {
            f(&subscriber);
        }
    }

    /// Push `event` to every subscriber in a snapshot.
    ///
    /// A subscriber whose queue is full or closed is dropped from the
    /// registry; the others still receive the event.
    pub async fn broadcast(&self, event: &PushEvent) -> DeliveryReport {
        let snapshot = self.snapshot().await;
        let mut report = DeliveryReport::default();

        for subscriber in &snapshot {
            match subscriber.offer(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(connection_id = %subscriber.id, "Subscriber too slow, dropping");
                    report.dropped.push(subscriber.id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(connection_id = %subscriber.id, "Subscriber gone, dropping");
                    report.dropped.push(subscriber.id);
                }
            }
        }

        if !report.dropped.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in &report.dropped {
                subscribers.remove(id);
            }
        }
        report
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Refuse new subscribers and drop every live one. Idempotent.
    ///
    /// Dropping a subscriber closes its queue, which ends its socket task.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut subscribers = self.subscribers.write().await;
        info!(live = subscribers.len(), "Registry shutting down");
        subscribers.clear();
    }
}
