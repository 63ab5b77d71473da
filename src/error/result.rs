//! Result type alias for metricast operations.

use super::metricast_error::MetricastError;

/// Type alias for Results using MetricastError.
pub type MetricastResult<T> = Result<T, MetricastError>;
