//! Failover connector driven against a real relay.

mod common;

use std::time::Duration;

use common::*;
use metricast::adapters::MemoryStore;
use metricast::connector::{ConnectionState, ConnectorConfig, ConnectorEvent, FailoverConnector};
use metricast::traits::TransportKind;
use metricast::websocket::UpdateSource;
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Nothing listens here; connections are refused immediately.
const DEAD: &str = "ws://127.0.0.1:1";

fn fast_config(endpoints: Vec<String>) -> ConnectorConfig {
    ConnectorConfig::new(endpoints)
        .unwrap()
        .with_handshake_timeout(Duration::from_secs(2))
        .with_retry_delay(Duration::from_millis(50))
        .with_max_attempts_per_endpoint(2)
        .with_poll_interval(Duration::from_millis(50))
}

async fn next_event(connector: &mut FailoverConnector) -> ConnectorEvent {
    tokio::time::timeout(WAIT, connector.recv())
        .await
        .expect("Timed out waiting for connector event")
        .expect("Connector stopped")
}

async fn wait_connected(connector: &mut FailoverConnector) -> (String, TransportKind) {
    loop {
        if let ConnectorEvent::Connected {
            endpoint,
            transport,
        } = next_event(connector).await
        {
            return (endpoint, transport);
        }
    }
}

#[tokio::test]
async fn test_fails_over_from_dead_endpoint_and_streams_samples() {
    let store = MemoryStore::new();
    store.set_latest(legacy_row());
    let relay = start_test_relay(&store, Duration::from_millis(50)).await;
    let live = ws_url(relay.local_addr());

    let mut connector = FailoverConnector::start(
        fast_config(vec![DEAD.to_string(), live.clone()])
            .with_transports([TransportKind::WebSocket]),
    );

    let (endpoint, transport) = wait_connected(&mut connector).await;
    assert_eq!(endpoint, live);
    assert_eq!(transport, TransportKind::WebSocket);

    let mut sources = Vec::new();
    while sources.len() < 2 {
        if let ConnectorEvent::Sample(update) = next_event(&mut connector).await {
            assert_eq!(update.sample.used_memory, 6_000_000_000);
            assert_eq!(update.sample.process_counts.total, 124);
            sources.push(update.source);
        }
    }
    assert_eq!(sources, vec![UpdateSource::Initial, UpdateSource::Periodic]);

    connector.close();
    relay.shutdown().await;
}

#[tokio::test]
async fn test_polling_transport_delivers_samples() {
    let store = MemoryStore::new();
    store.set_latest(canonical_row(321));
    let relay = start_test_relay(&store, Duration::from_millis(50)).await;
    let live = format!("http://{}", relay.local_addr());

    let mut connector = FailoverConnector::start(
        fast_config(vec![live]).with_transports([TransportKind::Polling]),
    );
    let (_, transport) = wait_connected(&mut connector).await;
    assert_eq!(transport, TransportKind::Polling);

    let mut periodic = 0;
    while periodic < 2 {
        if let ConnectorEvent::Sample(update) = next_event(&mut connector).await {
            assert_eq!(update.sample.used_memory, 321);
            if update.source == UpdateSource::Periodic {
                periodic += 1;
            }
        }
    }

    connector.close();
    relay.shutdown().await;
}

/// Everything the connector reports within `window`.
async fn events_within(connector: &mut FailoverConnector, window: Duration) -> Vec<ConnectorEvent> {
    let deadline = tokio::time::Instant::now() + window;
    let mut events = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, connector.recv()).await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_polling_rides_out_store_outage_behind_healthy_relay() {
    let store = MemoryStore::new();
    store.set_latest(canonical_row(5));
    let relay = start_test_relay(&store, Duration::from_millis(50)).await;
    let live = format!("http://{}", relay.local_addr());

    let mut connector = FailoverConnector::start(
        fast_config(vec![live.clone(), "http://127.0.0.1:1".to_string()])
            .with_transports([TransportKind::Polling])
            .with_max_rotations(Some(1)),
    );
    let (endpoint, _) = wait_connected(&mut connector).await;
    assert_eq!(endpoint, live);

    store.set_unavailable("db restarting");
    let during = events_within(&mut connector, Duration::from_millis(600)).await;
    assert!(
        during
            .iter()
            .all(|e| matches!(e, ConnectorEvent::Sample(_))),
        "store outage leaked into connection events: {:?}",
        during
    );
    assert!(connector.is_connected());

    store.set_latest(canonical_row(77));
    loop {
        if let ConnectorEvent::Sample(update) = next_event(&mut connector).await {
            if update.sample.used_memory == 77 {
                break;
            }
        }
    }

    connector.close();
    relay.shutdown().await;
}

#[tokio::test]
async fn test_polling_connects_while_relay_store_is_down() {
    let store = MemoryStore::new();
    store.set_unavailable("db restarting");
    let relay = start_test_relay(&store, Duration::from_millis(50)).await;
    let live = format!("http://{}", relay.local_addr());

    let mut connector = FailoverConnector::start(
        fast_config(vec![live.clone()]).with_transports([TransportKind::Polling]),
    );
    let (endpoint, transport) = wait_connected(&mut connector).await;
    assert_eq!(endpoint, live);
    assert_eq!(transport, TransportKind::Polling);

    connector.close();
    relay.shutdown().await;
}

#[tokio::test]
async fn test_stalled_polling_relay_is_reported_as_disconnect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"usedMemory": 1, "totalMemory": 2})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"usedMemory": 1, "totalMemory": 2}))
                .set_delay(Duration::from_secs(600)),
        )
        .mount(&server)
        .await;

    let mut connector = FailoverConnector::start(
        fast_config(vec![server.uri()])
            .with_handshake_timeout(Duration::from_secs(1))
            .with_transports([TransportKind::Polling]),
    );
    wait_connected(&mut connector).await;

    loop {
        if let ConnectorEvent::Disconnected { endpoint, .. } = next_event(&mut connector).await {
            assert_eq!(endpoint, server.uri());
            break;
        }
    }
    assert!(!connector.is_connected());

    connector.close();
}

#[tokio::test]
async fn test_relay_shutdown_reports_one_disconnect_then_retries() {
    let store = MemoryStore::new();
    store.set_latest(canonical_row(10));
    let relay = start_test_relay(&store, Duration::from_millis(50)).await;
    let live = ws_url(relay.local_addr());

    let mut connector = FailoverConnector::start(
        fast_config(vec![live.clone()]).with_transports([TransportKind::WebSocket]),
    );
    wait_connected(&mut connector).await;

    relay.shutdown().await;

    let mut disconnects = 0;
    let mut retries = 0;
    while retries < 3 {
        match next_event(&mut connector).await {
            ConnectorEvent::Disconnected { endpoint, .. } => {
                assert_eq!(endpoint, live);
                disconnects += 1;
            }
            ConnectorEvent::Reconnecting { .. } => retries += 1,
            ConnectorEvent::Connected { .. } => panic!("relay is gone"),
            _ => {}
        }
    }
    assert_eq!(disconnects, 1);
    assert!(!connector.state().is_terminal());

    connector.close();
    assert_eq!(connector.state(), ConnectionState::Idle);
    assert_eq!(connector.recv().await, None);
}

#[tokio::test]
async fn test_all_dead_endpoints_exhaust() {
    let mut connector = FailoverConnector::start(
        fast_config(vec![DEAD.to_string(), "http://127.0.0.1:1".to_string()])
            .with_max_rotations(Some(1)),
    );

    let mut last = None;
    while let Some(event) = tokio::time::timeout(WAIT, connector.recv())
        .await
        .expect("Timed out waiting for exhaustion")
    {
        last = Some(event);
    }

    assert_eq!(last, Some(ConnectorEvent::Exhausted { rotations: 1 }));
    assert_eq!(connector.state(), ConnectionState::Exhausted);
}
