//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): gated requests by gate, outcome
//! - `gate_wait_duration_seconds` (histogram): time from request start to outcome
//! - `gate_forward_attempts_total` (counter): inner handler invocations
//! - `gate_lookup_errors_total` (counter): failed dependency lookups
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record the terminal outcome of one gated request.
pub fn record_gate_outcome(gate: &str, outcome: &'static str, start: Instant) {
    let labels = [("gate", gate.to_string()), ("outcome", outcome.to_string())];
    metrics::counter!("gate_requests_total", &labels).increment(1);
    metrics::histogram!("gate_wait_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_forward_attempts(gate: &str, attempts: u32) {
    metrics::counter!("gate_forward_attempts_total", "gate" => gate.to_string()).increment(u64::from(attempts));
}

pub fn record_lookup_error(gate: &str) {
    metrics::counter!("gate_lookup_errors_total", "gate" => gate.to_string()).increment(1);
}
