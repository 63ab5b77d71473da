//! Error handling for the relay and the observer connector.
//!
//! | Error | Where it arises | Handling |
//! |-------|-----------------|----------|
//! | [`StoreError`] | metrics accessor | log, skip tick |
//! | [`SampleError`] | normalizer | log, drop message |
//! | [`ConnectError`] | connector attempts | drive reconnect |
//! | [`ConnectorError`] | connector setup / finite ceiling | surface to caller |
//!
//! [`MetricastError`] unifies them with a category, an error code and a
//! retry hint.

mod category;
mod connect;
mod metricast_error;
mod result;
mod sample;
mod store;

pub use category::ErrorCategory;
pub use connect::{ConnectError, ConnectorError};
pub use metricast_error::MetricastError;
pub use result::MetricastResult;
pub use sample::SampleError;
pub use store::{classify_reqwest_error, StoreError};
