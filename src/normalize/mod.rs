//! Sample normalization.
//!
//! Turns any producer-shaped document into a canonical [`Sample`]. The
//! function is pure: the same document always yields the same sample, and
//! the wall clock is never consulted.
//!
//! Resolution per field walks the ordered tables in [`aliases`]. Derived
//! values:
//!
//! - `usedMemory`: the used alias, else `total - free`, else
//!   `round(total * percent / 100)`
//! - `freeMemory`: always `total - used`
//! - `memoryUsedPercent`: the percent alias (clamped), else `used / total * 100`
//! - `processCounts.total`: the total alias when it is at least the state sum,
//!   else the state sum
//!
//! A document is malformed when no `totalMemory` alias holds a positive value,
//! or when none of the used/free/percent aliases is present.

pub mod aliases;
mod coerce;

use serde_json::{Map, Value};

use crate::error::SampleError;
use crate::models::{ProcessCounts, RawSample, Sample};

use coerce::{as_f64, count, first_bytes, first_number, first_percent, first_timestamp};

/// Normalize a raw document into a canonical sample.
pub fn normalize(raw: &RawSample) -> Result<Sample, SampleError> {
    let total = aliases::TOTAL_MEMORY
        .iter()
        .filter_map(|key| raw.get(*key))
        .filter_map(as_f64)
        .find(|v| *v >= 1.0)
        .map(|v| v.round() as u64)
        .ok_or_else(|| SampleError::malformed("totalMemory", aliases::TOTAL_MEMORY))?;

    let used = first_bytes(raw, aliases::USED_MEMORY).map(|u| u.min(total));
    let free = first_bytes(raw, aliases::FREE_MEMORY).map(|f| f.min(total));
    let percent = first_percent(raw, aliases::MEMORY_USED_PERCENT);

    let used = match (used, free, percent) {
        (Some(used), _, _) => used,
        (None, Some(free), _) => total - free,
        (None, None, Some(percent)) => ((total as f64) * percent / 100.0).round() as u64,
        (None, None, None) => {
            let tried: Vec<&str> = aliases::USED_MEMORY
                .iter()
                .chain(aliases::FREE_MEMORY)
                .chain(aliases::MEMORY_USED_PERCENT)
                .copied()
                .collect();
            return Err(SampleError::malformed("usedMemory", &tried));
        }
    };

    let memory_used_percent =
        percent.unwrap_or_else(|| coerce::clamp_percent(used as f64 / total as f64 * 100.0));
    let cpu_used_percent = first_percent(raw, aliases::CPU_USED_PERCENT).unwrap_or(0.0);

    Ok(Sample {
        total_memory: total,
        free_memory: total - used,
        used_memory: used,
        memory_used_percent,
        cpu_used_percent,
        process_counts: process_counts(raw),
        captured_at: first_timestamp(raw, aliases::CAPTURED_AT),
    })
}

/// Normalize an arbitrary JSON value; anything but an object is malformed.
pub fn normalize_value(value: &Value) -> Result<Sample, SampleError> {
    match value {
        Value::Object(raw) => normalize(raw),
        other => Err(SampleError::NotAnObject {
            found: json_kind(other),
        }),
    }
}

fn process_counts(raw: &RawSample) -> ProcessCounts {
    let nested = raw.get(aliases::PROCESS_COUNTS).and_then(Value::as_object);

    // Nested canonical object first, then top-level legacy keys.
    let lookup = |nested_aliases: &[&str], top_aliases: &[&str]| -> u64 {
        match nested.filter(|n| first_number(n, nested_aliases).is_some()) {
            Some(n) => count(n, nested_aliases),
            None => count(raw, top_aliases),
        }
    };

    let total = nested
        .and_then(|n| first_number(n, aliases::NESTED_TOTAL_PROCESSES))
        .or_else(|| first_number(raw, aliases::TOTAL_PROCESSES))
        .filter(|v| *v > 0.0)
        .map(|v| v.trunc() as u64);

    ProcessCounts::new(
        lookup(aliases::RUNNING, aliases::RUNNING),
        lookup(aliases::SLEEPING, aliases::SLEEPING),
        lookup(aliases::STOPPED, aliases::STOPPED),
        lookup(aliases::ZOMBIE, aliases::ZOMBIE),
        total,
    )
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The object inside `value`, if it is one.
pub fn as_raw(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawSample {
        as_raw(value).unwrap()
    }

    #[test]
    fn test_snake_case_total_and_used() {
        let sample = normalize(&raw(json!({"total_memory": 2048, "used_memory": 1024}))).unwrap();
        assert_eq!(sample.total_memory, 2048);
        assert_eq!(sample.used_memory, 1024);
        assert_eq!(sample.free_memory, 1024);
        assert_eq!(sample.memory_used_percent, 50.0);
        assert_eq!(sample.cpu_used_percent, 0.0);
        assert_eq!(sample.process_counts, ProcessCounts::default());
    }

    #[test]
    fn test_every_total_alias_normalizes_identically() {
        let expected = normalize(&raw(json!({"totalMemory": 8192, "usedMemory": 2048}))).unwrap();
        for alias in aliases::TOTAL_MEMORY {
            let mut doc = Map::new();
            doc.insert(alias.to_string(), json!(8192));
            doc.insert("usedMemory".to_string(), json!(2048));
            assert_eq!(normalize(&doc).unwrap(), expected, "alias {}", alias);
        }
    }

    #[test]
    fn test_every_cpu_alias_normalizes_identically() {
        let expected = normalize(&raw(json!({
            "totalMemory": 100, "usedMemory": 10, "cpuUsedPercent": 33.5
        })))
        .unwrap();
        for alias in aliases::CPU_USED_PERCENT {
            let mut doc = raw(json!({"totalMemory": 100, "usedMemory": 10}));
            doc.insert(alias.to_string(), json!(33.5));
            assert_eq!(normalize(&doc).unwrap(), expected, "alias {}", alias);
        }
    }

    #[test]
    fn test_alias_priority_prefers_canonical() {
        let sample = normalize(&raw(json!({
            "totalMemory": 4096,
            "memoria_total": 1,
            "usedMemory": 1024,
        })))
        .unwrap();
        assert_eq!(sample.total_memory, 4096);
    }

    #[test]
    fn test_unusable_alias_falls_through_to_next() {
        let sample = normalize(&raw(json!({
            "totalMemory": "unknown",
            "memoria_total": 1000,
            "memoria_libre": 250,
        })))
        .unwrap();
        assert_eq!(sample.total_memory, 1000);
        assert_eq!(sample.used_memory, 750);
        assert_eq!(sample.memory_used_percent, 75.0);
    }

    #[test]
    fn test_used_derived_from_percent_round_trips() {
        let total: u64 = 16_384_000;
        for percent in [0.0, 12.3, 33.3, 50.0, 87.65, 100.0] {
            let sample = normalize(&raw(json!({
                "ram_total": total,
                "porcentaje_ram": percent,
            })))
            .unwrap();
            let rederived = sample.used_memory as f64 / sample.total_memory as f64 * 100.0;
            assert!((rederived - percent).abs() < 0.1, "percent {}", percent);
            assert!(sample.is_consistent(0));
        }
    }

    #[test]
    fn test_used_plus_free_equals_total() {
        let sample = normalize(&raw(json!({
            "memoria_total": 7_000_000,
            "memoria_usada": 3_000_000,
            "memoria_libre": 4_000_000,
        })))
        .unwrap();
        assert!(sample.is_consistent(0));
    }

    #[test]
    fn test_used_is_capped_at_total() {
        let sample = normalize(&raw(json!({"total": 100, "uso": 250}))).unwrap();
        assert_eq!(sample.used_memory, 100);
        assert_eq!(sample.free_memory, 0);
        assert_eq!(sample.memory_used_percent, 100.0);
    }

    #[test]
    fn test_percentages_are_clamped() {
        let sample = normalize(&raw(json!({
            "totalMemory": 100,
            "usedMemory": 10,
            "memoryUsedPercent": 180,
            "cpu_usage": -20,
        })))
        .unwrap();
        assert_eq!(sample.memory_used_percent, 100.0);
        assert_eq!(sample.cpu_used_percent, 0.0);
    }

    #[test]
    fn test_numeric_strings_are_parsed() {
        let sample = normalize(&raw(json!({
            "ram_total": "2048",
            "ram_used": "512",
            "cpu_usage": "12.5",
        })))
        .unwrap();
        assert_eq!(sample.used_memory, 512);
        assert_eq!(sample.cpu_used_percent, 12.5);
    }

    #[test]
    fn test_store_row_shape() {
        let sample = normalize(&raw(json!({
            "memoria_total": 16000,
            "memoria_libre": 6000,
            "memoria_usada": 10000,
            "porcentaje_ram": 62,
            "porcentaje_cpu_uso": 17,
            "porcentaje_cpu_libre": 83,
            "procesos_corriendo": 2,
            "total_procesos": 300,
            "procesos_durmiendo": 250,
            "procesos_zombie": 1,
            "procesos_parados": 0,
            "hora": "2025-06-01 10:00:00",
        })))
        .unwrap();
        assert_eq!(sample.memory_used_percent, 62.0);
        assert_eq!(sample.cpu_used_percent, 17.0);
        assert_eq!(sample.process_counts.running, 2);
        assert_eq!(sample.process_counts.sleeping, 250);
        assert_eq!(sample.process_counts.zombie, 1);
        assert_eq!(sample.process_counts.total, 300);
        assert_eq!(
            sample.captured_at.unwrap().to_rfc3339(),
            "2025-06-01T10:00:00+00:00"
        );
    }

    #[test]
    fn test_process_total_recomputed_from_states() {
        let sample = normalize(&raw(json!({
            "totalMemory": 10,
            "usedMemory": 5,
            "running_processes": 3,
            "sleeping_processes": 7,
            "stopped_processes": -1,
            "zombie_processes": 1,
        })))
        .unwrap();
        assert_eq!(sample.process_counts.stopped, 0);
        assert_eq!(sample.process_counts.total, 11);
    }

    #[test]
    fn test_nested_process_counts_take_priority() {
        let sample = normalize(&raw(json!({
            "totalMemory": 10,
            "usedMemory": 5,
            "processCounts": {"running": 4, "sleeping": 1, "stopped": 0, "zombie": 0, "total": 9},
            "procesos_corriendo": 99,
        })))
        .unwrap();
        assert_eq!(sample.process_counts.running, 4);
        assert_eq!(sample.process_counts.total, 9);
    }

    #[test]
    fn test_missing_total_is_malformed() {
        let err = normalize(&raw(json!({"usedMemory": 10, "cpuUsedPercent": 5}))).unwrap_err();
        assert!(matches!(err, SampleError::Malformed { field: "totalMemory", .. }));
    }

    #[test]
    fn test_zero_total_is_malformed() {
        let err = normalize(&raw(json!({"totalMemory": 0, "usedMemory": 0}))).unwrap_err();
        assert!(matches!(err, SampleError::Malformed { field: "totalMemory", .. }));
    }

    #[test]
    fn test_missing_memory_reading_is_malformed() {
        let err = normalize(&raw(json!({"totalMemory": 10, "cpu_usage": 5}))).unwrap_err();
        assert!(matches!(err, SampleError::Malformed { field: "usedMemory", .. }));
    }

    #[test]
    fn test_non_object_is_malformed() {
        let err = normalize_value(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err, SampleError::NotAnObject { found: "array" });
    }

    #[test]
    fn test_normalization_is_pure() {
        let doc = raw(json!({"ram_total": 999, "ram_free": 333, "cpuUsagePercent": "4.2"}));
        assert_eq!(normalize(&doc).unwrap(), normalize(&doc).unwrap());
    }

    #[test]
    fn test_canonical_sample_is_a_fixed_point() {
        let sample = normalize(&raw(json!({
            "memoria_total": 5000,
            "memoria_usada": 1250,
            "porcentaje_cpu_uso": 40,
            "procesos_corriendo": 1,
            "procesos_durmiendo": 2,
            "hora": "2025-01-02 03:04:05",
        })))
        .unwrap();
        let wire = serde_json::to_value(&sample).unwrap();
        assert_eq!(normalize_value(&wire).unwrap(), sample);
    }
}
