//! Sample normalization errors.

use thiserror::Error;

/// A producer document that cannot be reconciled into a sample.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    /// None of the recognized aliases for a mandatory field is usable.
    #[error("Malformed sample: no usable value for {field} (tried {tried})")]
    Malformed { field: &'static str, tried: String },

    /// The payload is not a JSON object.
    #[error("Malformed sample: expected an object, got {found}")]
    NotAnObject { found: &'static str },
}

impl SampleError {
    pub(crate) fn malformed(field: &'static str, aliases: &[&str]) -> Self {
        SampleError::Malformed {
            field,
            tried: aliases.join(", "),
        }
    }

    pub fn error_code(&self) -> &'static str {
        "E_SAMPLE_MALFORMED"
    }
}
