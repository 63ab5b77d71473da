//! Unified error type.
//!
//! `MetricastError` wraps the domain errors so binaries and embedding
//! applications can classify any failure the same way.

use thiserror::Error;

use super::category::ErrorCategory;
use super::connect::{ConnectError, ConnectorError};
use super::sample::SampleError;
use super::store::StoreError;

#[derive(Debug, Error)]
pub enum MetricastError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MetricastError {
    pub fn config(message: impl Into<String>) -> Self {
        MetricastError::Config {
            message: message.into(),
        }
    }

    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            MetricastError::Store(_) => ErrorCategory::Store,
            MetricastError::Sample(_) => ErrorCategory::Data,
            MetricastError::Connect(ConnectError::InvalidEndpoint { .. }) => {
                ErrorCategory::Configuration
            }
            MetricastError::Connect(_) => ErrorCategory::Network,
            MetricastError::Connector(ConnectorError::EmptyEndpointList) => {
                ErrorCategory::Configuration
            }
            MetricastError::Connector(_) => ErrorCategory::Network,
            MetricastError::Config { .. } => ErrorCategory::Configuration,
            MetricastError::Io(_) => ErrorCategory::Network,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            // A finite rotation ceiling was hit on purpose.
            MetricastError::Connector(ConnectorError::AllEndpointsExhausted { .. }) => false,
            _ => self.category().is_retryable(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            MetricastError::Store(err) => err.error_code(),
            MetricastError::Sample(err) => err.error_code(),
            MetricastError::Connect(err) => err.error_code(),
            MetricastError::Connector(err) => err.error_code(),
            MetricastError::Config { .. } => "E_CONFIG",
            MetricastError::Io(_) => "E_IO",
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        format!("{}. {}", self, self.category().recovery_hint())
    }
}
