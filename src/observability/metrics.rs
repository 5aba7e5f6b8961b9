//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatch metrics (requests, service errors, connections)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): request cycles started, by service kind
//! - `dispatch_service_errors_total` (counter): service failures, by error kind
//! - `dispatch_payload_rejected_total` (counter): oversized buffered requests
//! - `dispatch_connections_active` (gauge): current connection count
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(service_kind: &'static str) {
    metrics::counter!("dispatch_requests_total", "service" => service_kind).increment(1);
}

pub fn record_service_error(error_kind: &'static str) {
    metrics::counter!("dispatch_service_errors_total", "kind" => error_kind).increment(1);
}

pub fn record_payload_rejected() {
    metrics::counter!("dispatch_payload_rejected_total").increment(1);
}

pub fn record_active_connections(active: u64) {
    metrics::gauge!("dispatch_connections_active").set(active as f64);
}
