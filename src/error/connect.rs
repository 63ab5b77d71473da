//! Push-connection errors on the observer side.

use thiserror::Error;

/// Failure of a single connection attempt or of an established transport.
///
/// These never reach the caller as errors: they drive the connector's
/// `Reconnecting` transition and show up only as a disconnect reason.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectError {
    /// The handshake did not complete within the configured timeout.
    #[error("Handshake with {endpoint} timed out after {timeout_ms}ms")]
    HandshakeTimeout { endpoint: String, timeout_ms: u64 },

    /// The transport failed while connecting or while connected.
    #[error("Transport error on {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The endpoint URL cannot be used by this transport.
    #[error("Invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },
}

impl ConnectError {
    pub fn transport(endpoint: impl Into<String>, message: impl ToString) -> Self {
        ConnectError::Transport {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Short, stable tag for log fields. Notices carry the full message.
    pub fn reason_tag(&self) -> &'static str {
        match self {
            ConnectError::HandshakeTimeout { .. } => "handshake timeout",
            ConnectError::Transport { .. } => "transport error",
            ConnectError::InvalidEndpoint { .. } => "invalid endpoint",
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectError::HandshakeTimeout { .. } => "E_CONN_TIMEOUT",
            ConnectError::Transport { .. } => "E_CONN_TRANSPORT",
            ConnectError::InvalidEndpoint { .. } => "E_CONN_ENDPOINT",
        }
    }
}

/// Errors from constructing or running a failover connector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectorError {
    #[error("Endpoint list is empty")]
    EmptyEndpointList,

    /// Only reachable when a finite rotation ceiling is configured.
    #[error("All {endpoints} endpoints exhausted after {rotations} rotation(s)")]
    AllEndpointsExhausted { endpoints: usize, rotations: u32 },
}

impl ConnectorError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::EmptyEndpointList => "E_CONN_NO_ENDPOINTS",
            ConnectorError::AllEndpointsExhausted { .. } => "E_CONN_EXHAUSTED",
        }
    }
}
