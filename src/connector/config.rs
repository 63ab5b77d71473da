//! Connector configuration.

use std::time::Duration;

use super::policy::RetryPolicy;
use crate::error::ConnectorError;
use crate::traits::TransportKind;

/// Default time allowed for one handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// Default period of the polling transport.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Ordered, non-empty list of candidate endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointList(Vec<String>);

impl EndpointList {
    /// Blank entries are dropped; an empty result is an error.
    pub fn new<I, S>(endpoints: I) -> Result<Self, ConnectorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let endpoints: Vec<String> = endpoints
            .into_iter()
            .map(|e| e.into().trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(ConnectorError::EmptyEndpointList);
        }
        Ok(Self(endpoints))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Index after `index`, wrapping to the start.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.0.len()
    }
}

/// Configuration for [`super::FailoverConnector`].
///
/// # Example
///
/// ```ignore
/// use metricast::connector::ConnectorConfig;
///
/// let config = ConnectorConfig::new(["ws://primary:6001", "ws://backup:6001"])?
///     .with_retry_delay(Duration::from_secs(1))
///     .with_max_rotations(Some(3));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub endpoints: EndpointList,
    pub handshake_timeout: Duration,
    pub policy: RetryPolicy,
    /// Transport kinds tried on every attempt, in order.
    pub transports: Vec<TransportKind>,
    pub poll_interval: Duration,
}

impl ConnectorConfig {
    pub fn new<I, S>(endpoints: I) -> Result<Self, ConnectorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            endpoints: EndpointList::new(endpoints)?,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            policy: RetryPolicy::default(),
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_max_attempts_per_endpoint(mut self, attempts: u32) -> Self {
        self.policy = self.policy.with_max_attempts_per_endpoint(attempts);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.policy = self.policy.with_retry_delay(delay);
        self
    }

    pub fn with_max_rotations(mut self, rotations: Option<u32>) -> Self {
        self.policy = self.policy.with_max_rotations(rotations);
        self
    }

    /// Duplicates are dropped; an empty list keeps the current transports.
    pub fn with_transports(mut self, transports: impl IntoIterator<Item = TransportKind>) -> Self {
        let mut kinds = Vec::new();
        for kind in transports {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if !kinds.is_empty() {
            self.transports = kinds;
        }
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
