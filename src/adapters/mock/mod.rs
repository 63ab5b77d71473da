//! Mock implementations for testing.
//!
//! # Available Mocks
//!
//! - [`MemoryStore`] - scriptable in-process metrics store
//! - [`MockTransport`] - push transport with per-endpoint dial outcomes and
//!   server-side link handles

pub mod store;
pub mod transport;

pub use store::MemoryStore;
pub use transport::{Dial, MockLink, MockTransport};
