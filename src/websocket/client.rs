//! WebSocket push transport built on tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

use crate::error::ConnectError;
use crate::traits::{PushStream, PushTransport, TransportKind};

/// Path the relay serves WebSocket upgrades on.
pub const WS_PATH: &str = "/ws";

/// Resolve an endpoint into the WebSocket URL to dial.
///
/// `http(s)://` becomes `ws(s)://`; a bare host gets the default `/ws` path.
pub fn websocket_url(endpoint: &str) -> Result<Url, ConnectError> {
    let invalid = |message: String| ConnectError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message,
    };

    let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid(format!("cannot switch scheme to {}", scheme)))?;
    if url.path().is_empty() || url.path() == "/" {
        url.set_path(WS_PATH);
    }
    Ok(url)
}

/// Opens WebSocket push connections.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushTransport for WsTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn open(&self, endpoint: &str) -> Result<Box<dyn PushStream>, ConnectError> {
        let url = websocket_url(endpoint)?;
        debug!(url = %url, "Opening WebSocket");

        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| ConnectError::transport(endpoint, e))?;

        info!(url = %url, "WebSocket handshake complete");
        Ok(Box::new(WsStream {
            endpoint: endpoint.to_string(),
            ws,
            closed: false,
        }))
    }
}

/// An open WebSocket connection.
pub struct WsStream {
    endpoint: String,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl PushStream for WsStream {
    async fn next_frame(&mut self) -> Option<Result<String, ConnectError>> {
        if self.closed {
            return None;
        }
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!(endpoint = %self.endpoint, "Ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Ping(data))) => {
                    let _ = self.ws.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(endpoint = %self.endpoint, ?frame, "Received close frame");
                    self.closed = true;
                    return None;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.closed = true;
                    return Some(Err(ConnectError::transport(&self.endpoint, e)));
                }
                None => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.ws.close(None).await;
        }
    }
}
