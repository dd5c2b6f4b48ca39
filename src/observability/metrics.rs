//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fault_injection_evaluations_total` (counter): requests that matched a rule
//! - `fault_injection_triggered_total` (counter): injections by rule and type
//! - `fault_injection_passthrough_total` (counter): triggered rules that fell
//!   back to the real handler, by reason
//! - `fault_leaked_tasks_total` (counter): leak tasks spawned, by shape
//! - `fault_running` (gauge): 1 while a named fault runs, 0 otherwise
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until a
//!   recorder is installed, so library users pay nothing by default
//! - Labels are rule ids and fault names, never request data

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const EVALUATIONS_TOTAL: &str = "fault_injection_evaluations_total";
pub const TRIGGERED_TOTAL: &str = "fault_injection_triggered_total";
pub const PASSTHROUGH_TOTAL: &str = "fault_injection_passthrough_total";
pub const LEAKED_TASKS_TOTAL: &str = "fault_leaked_tasks_total";
pub const FAULT_RUNNING: &str = "fault_running";

/// Install the Prometheus recorder with its HTTP listener on `addr`.
///
/// Must run inside a Tokio runtime; call once per process.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_all();
    tracing::info!(address = %addr, "Prometheus metrics endpoint active");
    Ok(())
}

fn describe_all() {
    describe_counter!(EVALUATIONS_TOTAL, "Requests that matched an injection rule");
    describe_counter!(TRIGGERED_TOTAL, "Injections triggered, by rule and type");
    describe_counter!(PASSTHROUGH_TOTAL, "Triggered injections that fell back to the real handler");
    describe_counter!(LEAKED_TASKS_TOTAL, "Leak tasks spawned, by shape");
    describe_gauge!(FAULT_RUNNING, "1 while the named fault is running");
}

pub fn record_evaluation() {
    counter!(EVALUATIONS_TOTAL).increment(1);
}

pub fn record_triggered(rule_id: &str, injection_type: &'static str) {
    counter!(TRIGGERED_TOTAL, "rule" => rule_id.to_string(), "type" => injection_type).increment(1);
}

pub fn record_passthrough(reason: &'static str) {
    counter!(PASSTHROUGH_TOTAL, "reason" => reason).increment(1);
}

pub fn record_leaked_tasks(shape: &'static str, count: usize) {
    counter!(LEAKED_TASKS_TOTAL, "shape" => shape).increment(count as u64);
}

pub fn record_fault_state(name: &str, running: bool) {
    gauge!(FAULT_RUNNING, "name" => name.to_string()).set(if running { 1.0 } else { 0.0 });
}
