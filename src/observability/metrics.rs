//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sdk_query_cache_lookups_total` (counter): lookups by result (hit, miss, uncached)
//! - `sdk_query_cache_entries` (gauge): registered cache entries
//! - `sdk_query_producer_runs_total` (counter): producer executions started
//! - `sdk_query_producer_errors_total` (counter): producer executions that failed
//! - `sdk_query_teardowns_total` (counter): shared stream resets by reason
//! - `sdk_transaction_status_total` (counter): emitted statuses by type
//! - `sdk_transaction_errors_total` (counter): transactions ending in error
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is only installed on request

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cache_lookup(result: &'static str) {
    counter!("sdk_query_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(size: usize) {
    gauge!("sdk_query_cache_entries").set(size as f64);
}

pub fn record_producer_run() {
    counter!("sdk_query_producer_runs_total").increment(1);
}

pub fn record_producer_error() {
    counter!("sdk_query_producer_errors_total").increment(1);
}

pub fn record_teardown(reason: &'static str) {
    counter!("sdk_query_teardowns_total", "reason" => reason).increment(1);
}

pub fn record_transaction_status(kind: &'static str) {
    counter!("sdk_transaction_status_total", "type" => kind).increment(1);
}

pub fn record_transaction_error() {
    counter!("sdk_transaction_errors_total").increment(1);
}
