//! Tokio driver of the failover machine.
//!
//! One task per connector owns the live [`PushStream`] and the single
//! pending retry timer. State is published on a `watch` channel and notices
//! on an unbounded `mpsc` channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::ConnectorConfig;
use super::machine::{Directive, FailoverMachine, Transition};
use super::state::{ConnectionState, ConnectorEvent};
use crate::adapters::PollingTransport;
use crate::error::ConnectError;
use crate::traits::{PushStream, PushTransport, TransportKind};
use crate::websocket::{decode_frame, WsTransport};

/// State shared between the caller and the driver task.
struct Shared {
    closed: AtomicBool,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: Mutex<Option<mpsc::UnboundedSender<ConnectorEvent>>>,
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ConnectionState) {
        // Checked under the watch lock, so a state can't land after close().
        self.state_tx.send_if_modified(|current| {
            if self.is_closed() || *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    fn emit(&self, event: ConnectorEvent) {
        let guard = self.events_tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(event);
        }
    }

    fn publish(&self, step: &Transition) {
        self.set_state(step.state.clone());
        for event in &step.events {
            log_event(event);
            self.emit(event.clone());
        }
    }

    /// Driver stopped on its own; the caller drains what is queued.
    fn finish(&self) {
        self.events_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Returns false if already closed.
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.finish();
        self.state_tx.send_replace(ConnectionState::Idle);
        true
    }
}

fn log_event(event: &ConnectorEvent) {
    match event {
        ConnectorEvent::Connecting { endpoint, attempt } => {
            debug!(endpoint = %endpoint, attempt, "Connecting")
        }
        ConnectorEvent::Connected {
            endpoint,
            transport,
        } => info!(endpoint = %endpoint, transport = %transport, "Connected"),
        ConnectorEvent::Disconnected { endpoint, reason } => {
            warn!(endpoint = %endpoint, reason = %reason, "Disconnected")
        }
        ConnectorEvent::Reconnecting {
            endpoint,
            attempt,
            delay,
            reason,
        } => debug!(
            endpoint = %endpoint,
            attempt,
            delay_ms = delay.as_millis() as u64,
            reason = %reason,
            "Scheduling reconnect"
        ),
        ConnectorEvent::Exhausted { rotations } => {
            warn!(rotations, "All endpoints exhausted, giving up")
        }
        ConnectorEvent::Sample(_) => {}
    }
}

/// Observer-side connection with failover across endpoints.
///
/// Dropping the connector closes it.
pub struct FailoverConnector {
    shared: Arc<Shared>,
    state_rx: watch::Receiver<ConnectionState>,
    events_rx: mpsc::UnboundedReceiver<ConnectorEvent>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl FailoverConnector {
    /// Start connecting with the transports named in `config`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: ConnectorConfig) -> Self {
        let transports = config
            .transports
            .iter()
            .map(|kind| match kind {
                TransportKind::WebSocket => Arc::new(WsTransport::new()) as Arc<dyn PushTransport>,
                TransportKind::Polling => Arc::new(
                    PollingTransport::new(config.poll_interval)
                        .with_request_timeout(config.handshake_timeout),
                ),
            })
            .collect();
        Self::start_with(config, transports)
    }

    /// Start connecting with explicit transports, tried in order on every
    /// attempt. `config.transports` is ignored.
    pub fn start_with(config: ConnectorConfig, transports: Vec<Arc<dyn PushTransport>>) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            closed: AtomicBool::new(false),
            state_tx,
            events_tx: Mutex::new(Some(events_tx)),
        });

        let machine = FailoverMachine::new(config.endpoints, config.policy);
        let task = tokio::spawn(run(
            machine,
            transports,
            config.handshake_timeout,
            shared.clone(),
            shutdown_rx,
        ));

        Self {
            shared,
            state_rx,
            events_rx,
            shutdown_tx,
            task: Some(task),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Receiver for state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected()
    }

    /// Next notice. `None` once the connector is closed or has stopped.
    pub async fn recv(&mut self) -> Option<ConnectorEvent> {
        if self.shared.is_closed() {
            return None;
        }
        self.events_rx.recv().await
    }

    /// Close the connector.
    ///
    /// Synchronous and idempotent: on return the state is `Idle`, any
    /// pending retry is cancelled and no further notices are delivered.
    pub fn close(&self) {
        if self.shared.close() {
            self.shutdown_tx.send_replace(true);
            info!("Connector closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Wait for the driver task to finish.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Connector task ended abnormally");
            }
        }
    }
}

impl Drop for FailoverConnector {
    fn drop(&mut self) {
        self.close();
    }
}

/// Try each transport once; the first handshake to succeed wins.
///
/// All transports share one `handshake_timeout` budget per attempt.
async fn dial(
    transports: &[Arc<dyn PushTransport>],
    endpoint: &str,
    handshake_timeout: Duration,
) -> Result<(TransportKind, Box<dyn PushStream>), ConnectError> {
    let deadline = Instant::now() + handshake_timeout;
    let mut last_error = None;
    for transport in transports {
        let kind = transport.kind();
        if Instant::now() >= deadline {
            debug!(endpoint = %endpoint, transport = %kind, "Handshake budget spent, skipping");
            break;
        }
        match tokio::time::timeout_at(deadline, transport.open(endpoint)).await {
            Ok(Ok(stream)) => return Ok((kind, stream)),
            Ok(Err(e)) => {
                debug!(
                    endpoint = %endpoint,
                    transport = %kind,
                    reason = e.reason_tag(),
                    error = %e,
                    "Handshake failed"
                );
                last_error = Some(e);
            }
            Err(_) => {
                debug!(endpoint = %endpoint, transport = %kind, "Handshake timed out");
                last_error = Some(ConnectError::HandshakeTimeout {
                    endpoint: endpoint.to_string(),
                    timeout_ms: handshake_timeout.as_millis() as u64,
                });
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| ConnectError::transport(endpoint, "no transports configured")))
}

/// Forward decoded samples until the connection drops; returns the reason.
async fn pump(stream: &mut dyn PushStream, shared: &Shared, endpoint: &str) -> String {
    loop {
        match stream.next_frame().await {
            Some(Ok(text)) => match decode_frame(&text) {
                Ok(Some(update)) => shared.emit(ConnectorEvent::Sample(update)),
                Ok(None) => debug!(endpoint = %endpoint, "Server has no data yet"),
                Err(e) => warn!(endpoint = %endpoint, error = %e, "Discarding malformed frame"),
            },
            Some(Err(e)) => return e.to_string(),
            None => return "connection closed by peer".to_string(),
        }
    }
}

async fn run(
    mut machine: FailoverMachine,
    transports: Vec<Arc<dyn PushTransport>>,
    handshake_timeout: Duration,
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut step = machine.start();

    loop {
        if shared.is_closed() {
            break;
        }
        shared.publish(&step);

        step = match step.directive {
            Directive::Halt => break,
            Directive::Hold => {
                // Only reachable if the machine was driven out of band.
                break;
            }
            Directive::Wait { delay } => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => machine.on_retry_due(),
                    _ = shutdown.changed() => break,
                }
            }
            Directive::Dial { endpoint } => {
                let attempt = tokio::select! {
                    result = dial(&transports, &endpoint, handshake_timeout) => result,
                    _ = shutdown.changed() => break,
                };
                let (kind, mut stream) = match attempt {
                    Ok(connected) => connected,
                    Err(e) => {
                        step = machine.on_handshake_failed(&e);
                        continue;
                    }
                };

                let connected = machine.on_handshake_ok(kind);
                if shared.is_closed() {
                    stream.close().await;
                    break;
                }
                shared.publish(&connected);

                let reason = tokio::select! {
                    reason = pump(stream.as_mut(), &shared, &endpoint) => Some(reason),
                    _ = shutdown.changed() => None,
                };
                stream.close().await;
                match reason {
                    Some(reason) => machine.on_disconnect(reason),
                    None => break,
                }
            }
        };
    }

    machine.close();
    shared.finish();
    debug!("Connector driver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{Dial, MockTransport};

    const X: &str = "ws://x:6001";
    const Y: &str = "ws://y:6001";

    const FRAME: &str = r#"{"event":"metrics-update","metrics":{"totalMemory":100,"usedMemory":40},"timestamp":"2025-06-01T10:00:00Z"}"#;

    fn start(transport: &MockTransport, config: ConnectorConfig) -> FailoverConnector {
        let transports: Vec<Arc<dyn PushTransport>> = vec![Arc::new(transport.clone())];
        FailoverConnector::start_with(config, transports)
    }

    async fn next_connected(connector: &mut FailoverConnector) -> (String, TransportKind) {
        loop {
            match connector.recv().await {
                Some(ConnectorEvent::Connected {
                    endpoint,
                    transport,
                }) => return (endpoint, transport),
                Some(_) => {}
                None => panic!("connector stopped before connecting"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_endpoint_fails_over_after_ceiling() {
        let transport = MockTransport::new(TransportKind::WebSocket);
        transport.set_behavior(X, Dial::Hang);
        transport.set_behavior(Y, Dial::Accept);

        let mut connector = start(&transport, ConnectorConfig::new([X, Y]).unwrap());
        let (endpoint, kind) = next_connected(&mut connector).await;

        assert_eq!(endpoint, Y);
        assert_eq!(kind, TransportKind::WebSocket);
        assert_eq!(transport.dial_count(X), 5);
        assert_eq!(transport.dial_count(Y), 1);
        assert!(connector.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout_and_retry_delay_are_honored() {
        let transport = MockTransport::new(TransportKind::WebSocket);
        transport.queue_behavior(X, Dial::Hang);
        transport.set_behavior(X, Dial::Accept);

        let started = tokio::time::Instant::now();
        let mut connector = start(&transport, ConnectorConfig::new([X]).unwrap());
        next_connected(&mut connector).await;

        // 10s handshake timeout, then the 2s retry delay.
        assert_eq!(started.elapsed(), Duration::from_secs(12));
        assert_eq!(transport.dial_count(X), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_flow_and_malformed_frames_are_dropped() {
        let transport = MockTransport::new(TransportKind::WebSocket);
        transport.set_behavior(X, Dial::Accept);
        let mut connector = start(&transport, ConnectorConfig::new([X]).unwrap());
        next_connected(&mut connector).await;

        let link = transport.last_link().unwrap();
        link.push(r#"{"event":"initial-data","metrics":null}"#);
        link.push("not json");
        link.push(r#"{"event":"metrics-update","metrics":{"cpuUsedPercent":3}}"#);
        link.push(FRAME);

        match connector.recv().await {
            Some(ConnectorEvent::Sample(update)) => {
                assert_eq!(update.sample.used_memory, 40);
                assert_eq!(update.sample.free_memory, 60);
            }
            other => panic!("expected sample, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_notifies_once_and_redials_same_endpoint() {
        let transport = MockTransport::new(TransportKind::WebSocket);
        transport.set_behavior(X, Dial::Accept);
        transport.set_behavior(Y, Dial::Accept);
        let mut connector = start(&transport, ConnectorConfig::new([X, Y]).unwrap());
        next_connected(&mut connector).await;

        let started = tokio::time::Instant::now();
        transport.last_link().unwrap().hang_up();

        let mut disconnects = 0;
        let (endpoint, _) = loop {
            match connector.recv().await {
                Some(ConnectorEvent::Disconnected { endpoint, .. }) => {
                    assert_eq!(endpoint, X);
                    disconnects += 1;
                }
                Some(ConnectorEvent::Connected {
                    endpoint,
                    transport,
                }) => break (endpoint, transport),
                Some(_) => {}
                None => panic!("connector stopped"),
            }
        };

        assert_eq!(disconnects, 1);
        assert_eq!(endpoint, X);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(transport.dial_count(X), 2);
        assert!(transport.links()[0].closed_by_client());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_downgrade_within_one_attempt() {
        let ws = MockTransport::new(TransportKind::WebSocket);
        let polling = MockTransport::new(TransportKind::Polling);
        polling.set_behavior(X, Dial::Accept);

        let transports: Vec<Arc<dyn PushTransport>> =
            vec![Arc::new(ws.clone()), Arc::new(polling.clone())];
        let mut connector =
            FailoverConnector::start_with(ConnectorConfig::new([X]).unwrap(), transports);
        let (endpoint, kind) = next_connected(&mut connector).await;

        assert_eq!(endpoint, X);
        assert_eq!(kind, TransportKind::Polling);
        assert_eq!(ws.dial_count(X), 1);
        assert_eq!(polling.dial_count(X), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_max_rotations() {
        let transport = MockTransport::new(TransportKind::WebSocket);
        let config = ConnectorConfig::new([X, Y])
            .unwrap()
            .with_max_attempts_per_endpoint(2)
            .with_max_rotations(Some(1));
        let mut connector = start(&transport, config);

        let mut last = None;
        while let Some(event) = connector.recv().await {
            last = Some(event);
        }
        assert_eq!(last, Some(ConnectorEvent::Exhausted { rotations: 1 }));
        assert_eq!(connector.state(), ConnectionState::Exhausted);
        assert_eq!(transport.dials().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_retry_and_is_silent() {
        let transport = MockTransport::new(TransportKind::WebSocket);
        let mut connector = start(&transport, ConnectorConfig::new([X]).unwrap());

        // Wait until the first failure has scheduled a retry.
        let mut states = connector.state_receiver();
        states
            .wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. }))
            .await
            .unwrap();

        connector.close();
        connector.close();
        assert_eq!(connector.state(), ConnectionState::Idle);
        assert!(connector.is_closed());

        connector.join().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(transport.dial_count(X), 1);
        assert_eq!(connector.recv().await, None);
        assert_eq!(connector.state(), ConnectionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_while_connected_closes_stream() {
        let transport = MockTransport::new(TransportKind::WebSocket);
        transport.set_behavior(X, Dial::Accept);
        let mut connector = start(&transport, ConnectorConfig::new([X]).unwrap());
        next_connected(&mut connector).await;

        connector.close();
        connector.join().await;

        let link = transport.last_link().unwrap();
        assert!(link.closed_by_client());
        link.push(FRAME);
        assert_eq!(connector.recv().await, None);
        assert_eq!(transport.dial_count(X), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_budget_is_shared_across_transports() {
        let ws = MockTransport::new(TransportKind::WebSocket);
        let polling = MockTransport::new(TransportKind::Polling);
        ws.set_behavior(X, Dial::Hang);
        polling.set_behavior(X, Dial::Hang);

        let transports: Vec<Arc<dyn PushTransport>> =
            vec![Arc::new(ws.clone()), Arc::new(polling.clone())];
        let started = tokio::time::Instant::now();
        let connector =
            FailoverConnector::start_with(ConnectorConfig::new([X]).unwrap(), transports);

        let mut states = connector.state_receiver();
        states
            .wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. }))
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(ws.dial_count(X), 1);
        assert_eq!(polling.dial_count(X), 0);
    }
}
