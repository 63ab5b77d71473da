//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`MetricsAccessor`] - read access to the latest stored row
//! - [`PushTransport`] / [`PushStream`] - observer-side push connections

pub mod store;
pub mod transport;

pub use store::MetricsAccessor;
pub use transport::{PushStream, PushTransport, TransportKind};
