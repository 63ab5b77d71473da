//! Mock push transport.
//!
//! Each endpoint is given a [`Dial`] outcome. Accepted connections hand the
//! test a [`MockLink`], the server end of the connection, which can push
//! frames, break the transport or hang up.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ConnectError;
use crate::traits::{PushStream, PushTransport, TransportKind};

/// Outcome of dialing an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dial {
    /// Fail the handshake immediately.
    Refuse,
    /// Never answer; the connector's handshake timeout fires.
    Hang,
    /// Complete the handshake.
    Accept,
}

enum LinkFrame {
    Text(String),
    Error(String),
    Hangup,
}

/// Server end of an accepted mock connection.
#[derive(Clone)]
pub struct MockLink {
    endpoint: String,
    tx: mpsc::UnboundedSender<LinkFrame>,
    closed_by_client: Arc<AtomicBool>,
}

impl MockLink {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Deliver a text frame to the client.
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.tx.send(LinkFrame::Text(text.into()));
    }

    /// Break the transport with an error.
    pub fn fail(&self, message: impl Into<String>) {
        let _ = self.tx.send(LinkFrame::Error(message.into()));
    }

    /// Close the connection from the server side.
    pub fn hang_up(&self) {
        let _ = self.tx.send(LinkFrame::Hangup);
    }

    /// Whether the client closed this connection.
    pub fn closed_by_client(&self) -> bool {
        self.closed_by_client.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct TransportState {
    sticky: HashMap<String, Dial>,
    queued: HashMap<String, VecDeque<Dial>>,
    dials: Vec<String>,
    links: Vec<MockLink>,
}

/// Scriptable push transport.
///
/// Endpoints without a configured outcome refuse. Clones share state.
#[derive(Clone)]
pub struct MockTransport {
    kind: TransportKind,
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(TransportState::default())),
        }
    }

    /// Outcome used for every dial of `endpoint` once queued outcomes run out.
    pub fn set_behavior(&self, endpoint: &str, dial: Dial) {
        self.state
            .lock()
            .unwrap()
            .sticky
            .insert(endpoint.to_string(), dial);
    }

    /// One-shot outcome, consumed before the sticky one.
    pub fn queue_behavior(&self, endpoint: &str, dial: Dial) {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry(endpoint.to_string())
            .or_default()
            .push_back(dial);
    }

    /// Endpoints dialed so far, in order.
    pub fn dials(&self) -> Vec<String> {
        self.state.lock().unwrap().dials.clone()
    }

    pub fn dial_count(&self, endpoint: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .dials
            .iter()
            .filter(|d| d.as_str() == endpoint)
            .count()
    }

    /// Server ends of every accepted connection, oldest first.
    pub fn links(&self) -> Vec<MockLink> {
        self.state.lock().unwrap().links.clone()
    }

    pub fn last_link(&self) -> Option<MockLink> {
        self.state.lock().unwrap().links.last().cloned()
    }

    fn next_outcome(&self, endpoint: &str) -> Dial {
        let mut state = self.state.lock().unwrap();
        state.dials.push(endpoint.to_string());
        if let Some(dial) = state.queued.get_mut(endpoint).and_then(VecDeque::pop_front) {
            return dial;
        }
        state.sticky.get(endpoint).copied().unwrap_or(Dial::Refuse)
    }
}

#[async_trait]
impl PushTransport for MockTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn open(&self, endpoint: &str) -> Result<Box<dyn PushStream>, ConnectError> {
        match self.next_outcome(endpoint) {
            Dial::Refuse => Err(ConnectError::transport(endpoint, "connection refused")),
            Dial::Hang => {
                std::future::pending::<()>().await;
                Err(ConnectError::transport(endpoint, "unreachable"))
            }
            Dial::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                let closed_by_client = Arc::new(AtomicBool::new(false));
                let link = MockLink {
                    endpoint: endpoint.to_string(),
                    tx,
                    closed_by_client: closed_by_client.clone(),
                };
                self.state.lock().unwrap().links.push(link);
                Ok(Box::new(MockStream {
                    endpoint: endpoint.to_string(),
                    rx,
                    closed_by_client,
                }))
            }
        }
    }
}

struct MockStream {
    endpoint: String,
    rx: mpsc::UnboundedReceiver<LinkFrame>,
    closed_by_client: Arc<AtomicBool>,
}

#[async_trait]
impl PushStream for MockStream {
    async fn next_frame(&mut self) -> Option<Result<String, ConnectError>> {
        if self.closed_by_client.load(Ordering::SeqCst) {
            return None;
        }
        match self.rx.recv().await {
            Some(LinkFrame::Text(text)) => Some(Ok(text)),
            Some(LinkFrame::Error(message)) => {
                Some(Err(ConnectError::transport(&self.endpoint, message)))
            }
            Some(LinkFrame::Hangup) | None => None,
        }
    }

    async fn close(&mut self) {
        self.closed_by_client.store(true, Ordering::SeqCst);
    }
}
