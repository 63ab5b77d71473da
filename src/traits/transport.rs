//! Push-connection trait abstraction for the observer side.
//!
//! A [`PushTransport`] knows how to open one kind of connection to an
//! endpoint; a [`PushStream`] yields the raw JSON text frames that arrive
//! on it. Frame decoding and normalization happen above this layer, so
//! every transport feeds the same pipeline.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConnectError;

/// Kinds of push transport, in the order they are usually preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Persistent WebSocket on `/ws`.
    WebSocket,
    /// Periodic HTTP reads of `/metrics/latest`.
    Polling,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::WebSocket => "websocket",
            TransportKind::Polling => "polling",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(TransportKind::WebSocket),
            "polling" | "poll" | "http" => Ok(TransportKind::Polling),
            other => Err(format!("unknown transport '{}'", other)),
        }
    }
}

/// An open push connection.
#[async_trait]
pub trait PushStream: Send {
    /// Next text frame. `None` means the peer closed the connection;
    /// `Some(Err(_))` means the transport broke.
    async fn next_frame(&mut self) -> Option<Result<String, ConnectError>>;

    /// Close the connection from our side. Must be safe to call more than once.
    async fn close(&mut self);
}

/// Opens push connections of one [`TransportKind`].
#[async_trait]
pub trait PushTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Perform the handshake with `endpoint`. The caller bounds this with the
    /// configured handshake timeout.
    async fn open(&self, endpoint: &str) -> Result<Box<dyn PushStream>, ConnectError>;
}
