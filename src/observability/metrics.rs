//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wwwhisper_decisions_total` (counter): access decisions by outcome
//! - `wwwhisper_backend_requests_total` (counter): backend calls by call, status
//! - `wwwhisper_backend_duration_seconds` (histogram): backend call latency
//! - `wwwhisper_injections_total` (counter): HTML responses rewritten
//!
//! Recording is a no-op until a recorder is installed, so library users
//! and tests pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Outcome of one pass through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted,
    Denied,
    Login,
    Failed,
}

impl Decision {
    fn as_str(self) -> &'static str {
        match self {
            Decision::Granted => "granted",
            Decision::Denied => "denied",
            Decision::Login => "login",
            Decision::Failed => "failed",
        }
    }
}

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_decision(decision: Decision) {
    metrics::counter!("wwwhisper_decisions_total", "outcome" => decision.as_str()).increment(1);
}

pub fn record_backend_request(call: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "wwwhisper_backend_requests_total",
        "call" => call,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("wwwhisper_backend_duration_seconds", "call" => call)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_backend_failure(call: &'static str, start: Instant) {
    metrics::counter!(
        "wwwhisper_backend_requests_total",
        "call" => call,
        "status" => "error"
    )
    .increment(1);
    metrics::histogram!("wwwhisper_backend_duration_seconds", "call" => call)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_injection() {
    metrics::counter!("wwwhisper_injections_total").increment(1);
}
