//! Observer-side failover connector.
//!
//! [`FailoverConnector`] keeps exactly one push connection open across an
//! ordered list of candidate endpoints, rotating on repeated handshake
//! failures. Transitions live in the IO-free [`FailoverMachine`]; the
//! driver runs it on tokio.
//!
//! # Example
//!
//! ```ignore
//! use metricast::connector::{ConnectorConfig, ConnectorEvent, FailoverConnector};
//!
//! let config = ConnectorConfig::new(["ws://primary:6001", "ws://backup:6001"])?;
//! let mut connector = FailoverConnector::start(config);
//! while let Some(event) = connector.recv().await {
//!     if let ConnectorEvent::Sample(update) = event {
//!         println!("{}", update.sample.summary());
//!     }
//! }
//! ```

pub mod config;
pub mod driver;
pub mod machine;
pub mod policy;
pub mod state;

pub use config::{ConnectorConfig, EndpointList, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_POLL_INTERVAL};
pub use driver::FailoverConnector;
pub use machine::{Directive, FailoverMachine, Transition};
pub use policy::{RetryPolicy, DEFAULT_MAX_ATTEMPTS_PER_ENDPOINT, DEFAULT_RETRY_DELAY};
pub use state::{ConnectionState, ConnectorEvent};
