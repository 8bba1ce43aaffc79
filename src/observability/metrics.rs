//! Metrics collection and exposition.
//!
//! # Metrics
//! - `multiserve_requests_total` (counter): requests by serving instance
//! - `multiserve_worker_shutdowns_total` (counter): worker closes by outcome
//! - `multiserve_workers` (gauge): workers currently running
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   pay nothing unless they opt in
//! - One process-wide Prometheus exporter; worker threads share its recorder

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(instance: usize) {
    metrics::counter!("multiserve_requests_total", "instance" => instance.to_string()).increment(1);
}

pub fn record_worker_shutdown(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("multiserve_worker_shutdowns_total", "outcome" => outcome).increment(1);
}

pub fn set_running_workers(count: usize) {
    metrics::gauge!("multiserve_workers").set(count as f64);
}
