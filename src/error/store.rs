//! Metrics store errors.
//!
//! Every variant here is the "store unavailable" condition: the broadcaster
//! logs it and skips the tick. "No data yet" is not an error and is reported
//! as `Ok(None)` by the accessor.

use thiserror::Error;

/// Failure to read the latest row from the external store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Metrics store unavailable: {message}")]
    Unavailable { message: String },

    /// The store did not answer within its own timeout.
    #[error("Metrics store timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The store answered, but not with a row or `null`.
    #[error("Metrics store returned an invalid response: {message}")]
    InvalidResponse { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::Unavailable { .. } => "E_STORE_DOWN",
            StoreError::Timeout { .. } => "E_STORE_TIMEOUT",
            StoreError::InvalidResponse { .. } => "E_STORE_INVALID",
        }
    }
}

/// Classify a reqwest error into a store error.
pub fn classify_reqwest_error(err: &reqwest::Error, timeout_ms: u64) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout {
            duration_ms: timeout_ms,
        }
    } else if err.is_decode() {
        StoreError::InvalidResponse {
            message: err.to_string(),
        }
    } else {
        StoreError::unavailable(err.to_string())
    }
}
