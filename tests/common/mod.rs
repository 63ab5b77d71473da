//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use metricast::adapters::MemoryStore;
use metricast::server::{start_relay, RunningRelay, ServerConfig};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// A row in the oldest producer's field naming.
pub fn legacy_row() -> Value {
    json!({
        "memoria_total": 8_000_000_000u64,
        "memoria_libre": 2_000_000_000u64,
        "porcentaje_cpu_uso": 37.5,
        "procesos_corriendo": 3,
        "procesos_durmiendo": 120,
        "procesos_parados": 0,
        "procesos_zombie": 1,
        "hora": "2025-06-01 10:00:00"
    })
}

/// A row in canonical field naming.
pub fn canonical_row(used: u64) -> Value {
    json!({
        "totalMemory": 1000,
        "usedMemory": used,
        "cpuUsedPercent": 10,
        "processCounts": {"running": 1, "sleeping": 9, "stopped": 0, "zombie": 0}
    })
}

/// Start a relay on an ephemeral port backed by `store`.
pub async fn start_test_relay(store: &MemoryStore, interval: Duration) -> RunningRelay {
    let config = ServerConfig::default()
        .with_bind_addr("127.0.0.1:0".parse().unwrap())
        .with_broadcast_interval(interval);
    start_relay(&config, Arc::new(store.clone()))
        .await
        .expect("Failed to start relay")
}

pub fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{}/ws", addr)
}

pub fn http_url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

pub async fn connect(addr: SocketAddr) -> TestSocket {
    let (socket, _) = tokio::time::timeout(WAIT, connect_async(ws_url(addr).as_str()))
        .await
        .expect("Timed out connecting")
        .expect("Failed to connect");
    socket
}

/// Next JSON text frame, skipping control frames. `None` when the socket closes.
pub async fn next_json(socket: &mut TestSocket) -> Option<Value> {
    loop {
        let frame = tokio::time::timeout(WAIT, socket.next())
            .await
            .expect("Timed out waiting for a frame")?;
        match frame {
            Ok(Message::Text(text)) => {
                return Some(serde_json::from_str(&text).expect("Frame is not JSON"))
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Wait until the relay has exactly `n` subscribers.
pub async fn wait_for_subscribers(relay: &RunningRelay, n: usize) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if relay.registry().len().await == n {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
