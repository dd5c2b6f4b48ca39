//! Typed parameters coerced from a rule's open `config` map.
//!
//! Malformed or missing values never fail the request: they fall back to the
//! documented default and log a warning.

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::faults::LeakShape;

pub const DEFAULT_DELAY_MS: u64 = 1000;
pub const DEFAULT_LEAK_COUNT: usize = 1;

/// Parameters of an `http_latency` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyParams {
    pub delay: Duration,
}

impl LatencyParams {
    pub fn from_config(config: &HashMap<String, Value>) -> Self {
        let delay_ms = match config.get("delay_ms") {
            None => DEFAULT_DELAY_MS,
            Some(value) => non_negative_integer(value).unwrap_or_else(|| {
                tracing::warn!(value = %value, default = DEFAULT_DELAY_MS, "Malformed delay_ms, using default");
                DEFAULT_DELAY_MS
            }),
        };
        Self {
            delay: Duration::from_millis(delay_ms),
        }
    }
}

/// Parameters of a `goroutine_leak` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeakParams {
    pub shape: LeakShape,
    pub count: usize,
}

impl LeakParams {
    /// `leak_count` is capped at `max_count`.
    pub fn from_config(config: &HashMap<String, Value>, max_count: usize) -> Self {
        let shape = match config.get("leak_type") {
            None => LeakShape::default(),
            Some(value) => value
                .as_str()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| {
                    tracing::warn!(value = %value, "Unknown leak_type, using infinite_loop");
                    LeakShape::default()
                }),
        };

        let count = match config.get("leak_count") {
            None => DEFAULT_LEAK_COUNT,
            Some(value) => non_negative_integer(value)
                .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
                .unwrap_or_else(|| {
                    tracing::warn!(value = %value, default = DEFAULT_LEAK_COUNT, "Malformed leak_count, using default");
                    DEFAULT_LEAK_COUNT
                }),
        };

        if count > max_count {
            tracing::warn!(requested = count, max = max_count, "leak_count capped");
        }

        Self {
            shape,
            count: count.min(max_count),
        }
    }
}

/// Accepts integers, whole-valued floats and numeric strings.
fn non_negative_integer(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}
