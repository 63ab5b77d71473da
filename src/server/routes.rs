//! HTTP and WebSocket routes of the relay.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, info, warn};

use super::broadcaster::Broadcaster;
use super::registry::ConnectionRegistry;
use crate::adapters::LATEST_PATH;
use crate::websocket::WS_PATH;

/// Legacy REST path kept for older dashboards.
pub const API_LATEST_PATH: &str = "/api/metrics/latest";

/// Shared state for the route handlers.
#[derive(Clone)]
pub struct RelayState {
    pub broadcaster: Arc<Broadcaster>,
    pub registry: Arc<ConnectionRegistry>,
}

/// Build the relay router.
pub fn router(state: RelayState, cors_origin: Option<&str>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route(WS_PATH, get(websocket_handler))
        .route(LATEST_PATH, get(latest_handler))
        .route(API_LATEST_PATH, get(latest_handler))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(str::trim) {
        None | Some("") | Some("*") => AllowOrigin::from(Any),
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => AllowOrigin::exact(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Invalid CORS origin, allowing any");
                AllowOrigin::from(Any)
            }
        },
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root_handler(State(state): State<RelayState>) -> impl IntoResponse {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "message": "Live host metrics relay",
        "endpoints": {
            "websocket": WS_PATH,
            "latest": [LATEST_PATH, API_LATEST_PATH],
        },
        "subscribers": state.registry.len().await,
    }))
}

/// `200 Sample|null`, or `503` when the store can't be read.
async fn latest_handler(State(state): State<RelayState>) -> Response {
    match state.broadcaster.latest_sample().await {
        Ok(sample) => Json(sample).into_response(),
        Err(e) => {
            warn!(error = %e, code = e.error_code(), "Latest sample request failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string(), "code": e.error_code() })),
            )
                .into_response()
        }
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    peer: Option<ConnectInfo<SocketAddr>>,
    State(state): State<RelayState>,
) -> impl IntoResponse {
    let peer = peer.map(|ConnectInfo(addr)| addr);
    ws.on_upgrade(move |socket| handle_websocket(socket, state, peer))
}

/// Serve one subscriber.
///
/// This task owns the socket: it drains the subscriber queue into it and
/// watches for the client going away. The subscriber is unregistered on
/// every exit path.
async fn handle_websocket(socket: WebSocket, state: RelayState, peer: Option<SocketAddr>) {
    let (subscriber, mut queue) = state.registry.open(peer);
    let id = subscriber.id;

    let initial = state.broadcaster.snapshot().await;
    if !state.registry.register(subscriber, initial).await {
        debug!(connection_id = %id, "Relay shutting down, closing new socket");
        let mut socket = socket;
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    info!(connection_id = %id, peer = ?peer, "Client connected");

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            event = queue.recv() => {
                let Some(event) = event else {
                    // Dropped by the registry: too slow, or shutting down.
                    debug!(connection_id = %id, "Subscriber queue closed");
                    break;
                };
                match event.to_text() {
                    Ok(text) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(connection_id = %id, event = event.name(), error = %e, "Failed to encode event");
                    }
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(connection_id = %id, error = %e, "WebSocket receive error");
                    break;
                }
                // Inbound messages carry no meaning; pings are answered by axum.
                Some(Ok(_)) => {}
            },
        }
    }

    state.registry.unregister(id).await;
    let _ = sender.close().await;
    info!(connection_id = %id, "Client disconnected");
}
