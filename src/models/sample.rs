//! Canonical metrics snapshot.
//!
//! A [`Sample`] is what every observer sees, regardless of which producer
//! version wrote the underlying row. Field names on the wire are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A raw, producer-shaped metrics document (one row from the store, or one
/// push payload before normalization).
pub type RawSample = Map<String, Value>;

/// Process-state counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCounts {
    pub running: u64,
    pub sleeping: u64,
    pub stopped: u64,
    pub zombie: u64,
    /// Never less than the sum of the four state counts.
    pub total: u64,
}

impl ProcessCounts {
    /// Build counts, recomputing `total` when it is absent or smaller than the
    /// sum of the state counts.
    pub fn new(running: u64, sleeping: u64, stopped: u64, zombie: u64, total: Option<u64>) -> Self {
        let mut counts = Self {
            running,
            sleeping,
            stopped,
            zombie,
            total: 0,
        };
        let sum = counts.state_sum();
        counts.total = match total {
            Some(t) if t >= sum && t > 0 => t,
            _ => sum,
        };
        counts
    }

    /// Sum of the four state counts, saturating at `u64::MAX`.
    pub fn state_sum(&self) -> u64 {
        self.running
            .saturating_add(self.sleeping)
            .saturating_add(self.stopped)
            .saturating_add(self.zombie)
    }
}

/// One normalized snapshot of system metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub total_memory: u64,
    pub free_memory: u64,
    pub used_memory: u64,
    pub memory_used_percent: f64,
    pub cpu_used_percent: f64,
    pub process_counts: ProcessCounts,
    /// When the producer captured the sample, if it said so.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

impl Sample {
    /// `used + free == total`, allowing `tolerance` bytes of rounding slack.
    pub fn is_consistent(&self, tolerance: u64) -> bool {
        let sum = self.used_memory.saturating_add(self.free_memory);
        sum.abs_diff(self.total_memory) <= tolerance
    }

    /// Compact one-line rendering used by the observer CLI.
    pub fn summary(&self) -> String {
        format!(
            "mem {:.1}% ({}/{}) cpu {:.1}% procs {} (R{} S{} T{} Z{})",
            self.memory_used_percent,
            self.used_memory,
            self.total_memory,
            self.cpu_used_percent,
            self.process_counts.total,
            self.process_counts.running,
            self.process_counts.sleeping,
            self.process_counts.stopped,
            self.process_counts.zombie,
        )
    }
}
