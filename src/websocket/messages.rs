//! Wire format of the push connection.
//!
//! Every frame is a JSON text message tagged by its `event` field:
//!
//! ```text
//! {"event":"initial-data","metrics":{...}|null}
//! {"event":"metrics-update","metrics":{...},"timestamp":"2025-06-01T10:00:00Z"}
//! ```
//!
//! Older producers pushed `system-metrics` frames carrying the raw row at the
//! top level; the decoder still accepts them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::SampleError;
use crate::models::Sample;
use crate::normalize;

pub const INITIAL_DATA: &str = "initial-data";
pub const METRICS_UPDATE: &str = "metrics-update";
pub const SYSTEM_METRICS: &str = "system-metrics";

/// Server-to-client events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum PushEvent {
    /// Sent once, immediately after the handshake.
    #[serde(rename = "initial-data")]
    InitialData { metrics: Option<Sample> },
    /// Sent once per broadcast tick.
    #[serde(rename = "metrics-update")]
    MetricsUpdate {
        metrics: Sample,
        timestamp: DateTime<Utc>,
    },
}

impl PushEvent {
    pub fn initial(metrics: Option<Sample>) -> Self {
        PushEvent::InitialData { metrics }
    }

    /// Update stamped with the current wall-clock time.
    pub fn update(metrics: Sample) -> Self {
        PushEvent::MetricsUpdate {
            metrics,
            timestamp: Utc::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::InitialData { .. } => INITIAL_DATA,
            PushEvent::MetricsUpdate { .. } => METRICS_UPDATE,
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Which kind of frame a sample arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Initial,
    Periodic,
    Legacy,
}

/// A decoded, normalized push frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleUpdate {
    pub sample: Sample,
    pub source: UpdateSource,
    /// Broadcast time, when the frame carried one.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Why a frame was discarded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("Invalid JSON frame: {0}")]
    InvalidJson(String),

    #[error("Frame has no event tag")]
    MissingEvent,

    #[error("Unknown event type: {0}")]
    UnknownEvent(String),

    #[error("Frame '{event}' carries no metrics")]
    MissingMetrics { event: &'static str },

    #[error(transparent)]
    Malformed(#[from] SampleError),
}

/// Decode one text frame.
///
/// `Ok(None)` is a well-formed `initial-data` frame with `metrics: null`:
/// the server had no data yet when we connected.
pub fn decode_frame(text: &str) -> Result<Option<SampleUpdate>, FrameError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| FrameError::InvalidJson(e.to_string()))?;
    let event = value
        .get("event")
        .and_then(Value::as_str)
        .ok_or(FrameError::MissingEvent)?;

    match event {
        INITIAL_DATA => match value.get("metrics") {
            None | Some(Value::Null) => Ok(None),
            Some(metrics) => Ok(Some(SampleUpdate {
                sample: normalize::normalize_value(metrics)?,
                source: UpdateSource::Initial,
                timestamp: None,
            })),
        },
        METRICS_UPDATE => {
            let metrics = match value.get("metrics") {
                None | Some(Value::Null) => {
                    return Err(FrameError::MissingMetrics {
                        event: METRICS_UPDATE,
                    })
                }
                Some(metrics) => metrics,
            };
            let timestamp = value
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|ts| ts.with_timezone(&Utc));
            Ok(Some(SampleUpdate {
                sample: normalize::normalize_value(metrics)?,
                source: UpdateSource::Periodic,
                timestamp,
            }))
        }
        SYSTEM_METRICS => {
            let payload = value.get("metrics").unwrap_or(&value);
            Ok(Some(SampleUpdate {
                sample: normalize::normalize_value(payload)?,
                source: UpdateSource::Legacy,
                timestamp: None,
            }))
        }
        other => Err(FrameError::UnknownEvent(other.to_string())),
    }
}
