//! Error category classification.
//!
//! Categories drive the two handling decisions the relay makes: skip and
//! retry on the next tick or attempt, or surface the failure to the operator.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The metrics store could not be read (unreachable, timeout, bad reply).
    /// Transient; the broadcaster tries again on its next tick.
    Store,

    /// A producer document could not be turned into a sample.
    /// The message is dropped; nothing is retried.
    Data,

    /// Push-connection failures (handshake, transport, disconnect).
    /// Transient; drives the connector's reconnect logic.
    Network,

    /// Invalid configuration (empty endpoint list, unparseable URL).
    /// Not retryable until configuration is corrected.
    Configuration,
}

impl ErrorCategory {
    /// Returns true if errors in this category are generally transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Store | ErrorCategory::Network)
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Store => "store",
            ErrorCategory::Data => "data",
            ErrorCategory::Network => "network",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Store => "Check that the metrics store is reachable",
            ErrorCategory::Data => "Check the producer's payload format",
            ErrorCategory::Network => "The connection will be retried automatically",
            ErrorCategory::Configuration => "Check your configuration settings",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
