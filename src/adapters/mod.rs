//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`HttpMetricsStore`] - metrics store read over HTTP with reqwest
//! - [`PollingTransport`] - push transport that polls `/metrics/latest`
//!
//! The WebSocket transport lives in [`crate::websocket`].
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles:
//! - [`mock::MemoryStore`] - scriptable store
//! - [`mock::MockTransport`] - scriptable push transport

pub mod http_store;
pub mod mock;
pub mod polling;

pub use http_store::{HttpMetricsStore, DEFAULT_STORE_TIMEOUT};
pub use mock::{MemoryStore, MockTransport};
pub use polling::{latest_url, PollingTransport, LATEST_PATH};
