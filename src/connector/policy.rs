use std::time::Duration;

/// Default ceiling of failed handshakes on one endpoint before rotating.
pub const DEFAULT_MAX_ATTEMPTS_PER_ENDPOINT: u32 = 5;
/// Default pause between handshake attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Retry schedule of the failover connector.
///
/// The delay is constant. `max_rotations` bounds how many times the endpoint
/// cursor may wrap back to the first endpoint; `None` retries forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts_per_endpoint: u32,
    pub retry_delay: Duration,
    pub max_rotations: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts_per_endpoint: DEFAULT_MAX_ATTEMPTS_PER_ENDPOINT,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_rotations: None,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero is treated as one: every endpoint gets at least one attempt.
    pub fn with_max_attempts_per_endpoint(mut self, attempts: u32) -> Self {
        self.max_attempts_per_endpoint = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_rotations(mut self, rotations: Option<u32>) -> Self {
        self.max_rotations = rotations;
        self
    }

    /// Whether `failed` attempts on one endpoint exhaust it.
    pub fn endpoint_exhausted(&self, failed: u32) -> bool {
        failed >= self.max_attempts_per_endpoint.max(1)
    }

    /// Whether `rotations` completed wraps end the connector.
    pub fn rotations_exhausted(&self, rotations: u32) -> bool {
        matches!(self.max_rotations, Some(max) if rotations >= max)
    }

    /// Delay before the next handshake after a failure.
    pub fn delay(&self) -> Duration {
        self.retry_delay
    }
}
