//! metricast - live host metrics fan-out
//!
//! The relay side reads the latest sample from a store, normalizes it and
//! pushes it to every WebSocket subscriber once per tick. The observer side
//! follows a relay through [`connector::FailoverConnector`], failing over
//! across candidate endpoints.

pub mod adapters;
pub mod connector;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod observer;
pub mod server;
pub mod traits;
pub mod websocket;
