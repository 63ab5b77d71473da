//! Connection states and the notices delivered to the caller.

use std::fmt;
use std::time::Duration;

use crate::traits::TransportKind;
use crate::websocket::SampleUpdate;

/// Where the connector is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not started, or closed by the caller.
    #[default]
    Idle,
    /// Handshake in flight. `attempt` is 1-based per endpoint.
    Connecting { endpoint: String, attempt: u32 },
    /// Exactly one live push connection.
    Connected {
        endpoint: String,
        transport: TransportKind,
    },
    /// Waiting `delay` before dialing `endpoint` again.
    Reconnecting {
        endpoint: String,
        attempt: u32,
        delay: Duration,
    },
    /// Gave up after the configured number of rotations. Terminal.
    Exhausted,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }

    /// Whether the driver has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Idle | ConnectionState::Exhausted)
    }

    /// Endpoint being dialed or served, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ConnectionState::Connecting { endpoint, .. }
            | ConnectionState::Connected { endpoint, .. }
            | ConnectionState::Reconnecting { endpoint, .. } => Some(endpoint),
            ConnectionState::Idle | ConnectionState::Exhausted => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Connecting { endpoint, attempt } => {
                write!(f, "connecting to {} (attempt {})", endpoint, attempt)
            }
            ConnectionState::Connected {
                endpoint,
                transport,
            } => write!(f, "connected to {} via {}", endpoint, transport),
            ConnectionState::Reconnecting {
                endpoint,
                attempt,
                delay,
            } => write!(
                f,
                "reconnecting to {} in {}ms (attempt {})",
                endpoint,
                delay.as_millis(),
                attempt
            ),
            ConnectionState::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Notices delivered to the caller, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    Connecting {
        endpoint: String,
        attempt: u32,
    },
    Connected {
        endpoint: String,
        transport: TransportKind,
    },
    /// A live connection dropped. Sent once per connection.
    Disconnected { endpoint: String, reason: String },
    /// A handshake failed or a connection dropped; next dial is scheduled.
    Reconnecting {
        endpoint: String,
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    /// A decoded, normalized sample.
    Sample(SampleUpdate),
    /// Every endpoint failed `max_rotations` times over.
    Exhausted { rotations: u32 },
}
