//! Line-oriented view used by `metricast watch`.
//!
//! ```text
//!   ● connected to ws://primary:6001 (websocket)
//!   10:00:01 mem 42.0% (430/1024) cpu 3.5% procs 212 (R2 S210 T0 Z0)
//!   ○ disconnected from ws://primary:6001: connection closed by peer
//!   10:00:01 mem 42.0% (430/1024) cpu 3.5% procs 212 (R2 S210 T0 Z0) [stale]
//! ```

use chrono::{DateTime, Local, Utc};
use serde_json::json;

use crate::connector::ConnectorEvent;
use crate::websocket::SampleUpdate;

const CONNECTED: &str = "●";
const DISCONNECTED: &str = "○";
const RETRY: &str = "…";
const FAILED: &str = "✗";

/// Tracks connectivity and the last sample, and renders events as lines.
#[derive(Debug, Default)]
pub struct ObserverView {
    connected: bool,
    last: Option<SampleUpdate>,
    json: bool,
}

impl ObserverView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render samples as JSON lines instead of text.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_sample(&self) -> Option<&SampleUpdate> {
        self.last.as_ref()
    }

    /// Whether the last sample predates the current disconnection.
    pub fn is_stale(&self) -> bool {
        !self.connected && self.last.is_some()
    }

    /// Apply an event and return the lines to print.
    pub fn apply(&mut self, event: &ConnectorEvent) -> Vec<String> {
        match event {
            ConnectorEvent::Connecting { endpoint, attempt } if *attempt == 1 => {
                vec![format!("  {} connecting to {}", RETRY, endpoint)]
            }
            ConnectorEvent::Connecting { .. } => Vec::new(),
            ConnectorEvent::Connected {
                endpoint,
                transport,
            } => {
                self.connected = true;
                vec![format!("  {} connected to {} ({})", CONNECTED, endpoint, transport)]
            }
            ConnectorEvent::Disconnected { endpoint, reason } => {
                self.connected = false;
                let mut lines = vec![format!(
                    "  {} disconnected from {}: {}",
                    DISCONNECTED, endpoint, reason
                )];
                if let Some(last) = &self.last {
                    lines.push(self.render(last));
                }
                lines
            }
            ConnectorEvent::Reconnecting {
                endpoint,
                attempt,
                delay,
                reason,
            } => {
                self.connected = false;
                vec![format!(
                    "  {} {} (retrying {} in {}ms, attempt {})",
                    RETRY,
                    reason,
                    endpoint,
                    delay.as_millis(),
                    attempt
                )]
            }
            ConnectorEvent::Sample(update) => {
                let line = self.render(update);
                self.last = Some(update.clone());
                vec![line]
            }
            ConnectorEvent::Exhausted { rotations } => {
                self.connected = false;
                vec![format!(
                    "  {} gave up after {} rotation(s) over all endpoints",
                    FAILED, rotations
                )]
            }
        }
    }

    fn render(&self, update: &SampleUpdate) -> String {
        let stale = !self.connected;
        if self.json {
            return json!({
                "metrics": update.sample,
                "timestamp": update.timestamp,
                "stale": stale,
            })
            .to_string();
        }
        let when = update
            .timestamp
            .or(update.sample.captured_at)
            .map(local_time)
            .unwrap_or_else(|| "--:--:--".to_string());
        let mut line = format!("  {} {}", when, update.sample.summary());
        if stale {
            line.push_str(" [stale]");
        }
        line
    }
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}
