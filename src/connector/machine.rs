//! Failover state machine.
//!
//! [`FailoverMachine`] holds the endpoint cursor, the per-endpoint attempt
//! counter and the rotation count. It performs no IO and reads no clock:
//! the driver feeds it outcomes and carries out the returned [`Directive`].
//!
//! ```text
//! Idle --start--> Connecting --ok--> Connected
//!                  |    ^               |
//!             failed    retry due    disconnect
//!                  v    |               |
//!                 Reconnecting <--------+
//!                  |
//!             rotations exhausted --> Exhausted
//! ```
//!
//! `close` moves any state to `Idle`.

use std::time::Duration;

use super::config::EndpointList;
use super::policy::RetryPolicy;
use super::state::{ConnectionState, ConnectorEvent};
use crate::error::ConnectError;
use crate::traits::TransportKind;

/// What the driver should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Open a connection to `endpoint` now.
    Dial { endpoint: String },
    /// Sleep, then report [`FailoverMachine::on_retry_due`].
    Wait { delay: Duration },
    /// A connection is live; pump it until it drops.
    Hold,
    /// Stop the driver.
    Halt,
}

/// Result of feeding one input to the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: ConnectionState,
    pub directive: Directive,
    pub events: Vec<ConnectorEvent>,
}

#[derive(Debug, Clone)]
pub struct FailoverMachine {
    endpoints: EndpointList,
    policy: RetryPolicy,
    cursor: usize,
    /// Failed handshakes on the current endpoint.
    failures: u32,
    /// Times the cursor wrapped back to the first endpoint.
    rotations: u32,
    state: ConnectionState,
}

impl FailoverMachine {
    pub fn new(endpoints: EndpointList, policy: RetryPolicy) -> Self {
        Self {
            endpoints,
            policy,
            cursor: 0,
            failures: 0,
            rotations: 0,
            state: ConnectionState::Idle,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn rotations(&self) -> u32 {
        self.rotations
    }

    fn current_endpoint(&self) -> String {
        self.endpoints.get(self.cursor).unwrap_or_default().to_string()
    }

    fn settle(
        &mut self,
        state: ConnectionState,
        directive: Directive,
        events: Vec<ConnectorEvent>,
    ) -> Transition {
        self.state = state.clone();
        Transition {
            state,
            directive,
            events,
        }
    }

    /// No-op for inputs that don't apply to the current state.
    fn ignore(&self) -> Transition {
        let directive = match &self.state {
            ConnectionState::Idle | ConnectionState::Exhausted => Directive::Halt,
            ConnectionState::Connected { .. } => Directive::Hold,
            ConnectionState::Connecting { endpoint, .. } => Directive::Dial {
                endpoint: endpoint.clone(),
            },
            ConnectionState::Reconnecting { delay, .. } => Directive::Wait { delay: *delay },
        };
        Transition {
            state: self.state.clone(),
            directive,
            events: Vec::new(),
        }
    }

    fn dial_current(&mut self) -> Transition {
        let endpoint = self.current_endpoint();
        let attempt = self.failures + 1;
        self.settle(
            ConnectionState::Connecting {
                endpoint: endpoint.clone(),
                attempt,
            },
            Directive::Dial {
                endpoint: endpoint.clone(),
            },
            vec![ConnectorEvent::Connecting { endpoint, attempt }],
        )
    }

    fn schedule_retry(
        &mut self,
        delay: Duration,
        reason: String,
        mut events: Vec<ConnectorEvent>,
    ) -> Transition {
        let endpoint = self.current_endpoint();
        let attempt = self.failures + 1;
        events.push(ConnectorEvent::Reconnecting {
            endpoint: endpoint.clone(),
            attempt,
            delay,
            reason,
        });
        self.settle(
            ConnectionState::Reconnecting {
                endpoint,
                attempt,
                delay,
            },
            Directive::Wait { delay },
            events,
        )
    }

    /// `Idle`/`Exhausted` → `Connecting` at the first endpoint.
    pub fn start(&mut self) -> Transition {
        if !self.state.is_terminal() {
            return self.ignore();
        }
        self.cursor = 0;
        self.failures = 0;
        self.rotations = 0;
        self.dial_current()
    }

    /// `Connecting` → `Connected`.
    pub fn on_handshake_ok(&mut self, transport: TransportKind) -> Transition {
        if !matches!(self.state, ConnectionState::Connecting { .. }) {
            return self.ignore();
        }
        self.failures = 0;
        let endpoint = self.current_endpoint();
        self.settle(
            ConnectionState::Connected {
                endpoint: endpoint.clone(),
                transport,
            },
            Directive::Hold,
            vec![ConnectorEvent::Connected {
                endpoint,
                transport,
            }],
        )
    }

    /// `Connecting` → `Reconnecting`, rotating or exhausting as the policy says.
    pub fn on_handshake_failed(&mut self, error: &ConnectError) -> Transition {
        if !matches!(self.state, ConnectionState::Connecting { .. }) {
            return self.ignore();
        }
        self.failures += 1;
        if self.policy.endpoint_exhausted(self.failures) {
            self.failures = 0;
            self.cursor = self.endpoints.next_index(self.cursor);
            if self.cursor == 0 {
                self.rotations += 1;
                if self.policy.rotations_exhausted(self.rotations) {
                    let rotations = self.rotations;
                    return self.settle(
                        ConnectionState::Exhausted,
                        Directive::Halt,
                        vec![ConnectorEvent::Exhausted { rotations }],
                    );
                }
            }
        }
        self.schedule_retry(self.policy.delay(), error.to_string(), Vec::new())
    }

    /// `Reconnecting` → `Connecting` once the delay has elapsed.
    pub fn on_retry_due(&mut self) -> Transition {
        if !matches!(self.state, ConnectionState::Reconnecting { .. }) {
            return self.ignore();
        }
        self.dial_current()
    }

    /// `Connected` → `Reconnecting` with no delay, same endpoint.
    pub fn on_disconnect(&mut self, reason: impl Into<String>) -> Transition {
        let ConnectionState::Connected { endpoint, .. } = &self.state else {
            return self.ignore();
        };
        let reason = reason.into();
        let disconnected = ConnectorEvent::Disconnected {
            endpoint: endpoint.clone(),
            reason: reason.clone(),
        };
        self.schedule_retry(Duration::ZERO, reason, vec![disconnected])
    }

    /// Any state → `Idle`. Emits nothing.
    pub fn close(&mut self) -> Transition {
        self.failures = 0;
        self.settle(ConnectionState::Idle, Directive::Halt, Vec::new())
    }
}
