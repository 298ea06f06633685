//! Gateway metrics
//!
//! Emitted through the `metrics` facade; nothing is exported unless the host
//! process installs a recorder.

use std::time::Duration;

use metrics::{counter, histogram};

/// Count one admit/deny decision
pub fn record_decision(operation: &str, outcome: &'static str) {
    counter!(
        "mantis_gate_decisions_total",
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record how long an admitted operation ran
pub fn record_execution(operation: &str, success: bool, duration: Duration) {
    histogram!(
        "mantis_gate_execution_duration_seconds",
        "operation" => operation.to_string(),
        "success" => if success { "true" } else { "false" }
    )
    .record(duration.as_secs_f64());
}

/// Count one audit flush attempt
pub fn record_audit_flush(records: usize, success: bool) {
    counter!(
        "mantis_gate_audit_flushes_total",
        "status" => if success { "ok" } else { "failed" }
    )
    .increment(1);

    if success {
        counter!("mantis_gate_audit_records_written_total").increment(records as u64);
    }
}
