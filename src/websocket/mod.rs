//! WebSocket wire format and client transport.
//!
//! [`messages`] defines the frames both sides exchange; [`client`] is the
//! observer's tokio-tungstenite transport.

pub mod client;
pub mod messages;

pub use client::{websocket_url, WsStream, WsTransport, WS_PATH};
pub use messages::{decode_frame, FrameError, PushEvent, SampleUpdate, UpdateSource};
