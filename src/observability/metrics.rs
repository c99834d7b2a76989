//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by route, status
//! - `relay_request_duration_seconds` (histogram): time to response headers
//! - `relay_resolver_duration_seconds` (histogram): resolver runtime by result
//! - `relay_sessions_active` (gauge): sessions currently pumping
//! - `relay_session_outcomes_total` (counter): how sessions ended
//! - `relay_bytes_total` (counter): body bytes handed downstream
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &'static str, status: u16, start_time: Instant) {
    counter!("relay_requests_total", "route" => route, "status" => status.to_string()).increment(1);
    histogram!("relay_request_duration_seconds", "route" => route)
        .record(start_time.elapsed().as_secs_f64());
}

pub fn record_resolution(success: bool, start_time: Instant) {
    let result = if success { "ok" } else { "error" };
    histogram!("relay_resolver_duration_seconds", "result" => result)
        .record(start_time.elapsed().as_secs_f64());
}

pub fn session_started() {
    gauge!("relay_sessions_active").increment(1.0);
}

pub fn session_finished(outcome: &'static str, bytes: u64) {
    gauge!("relay_sessions_active").decrement(1.0);
    counter!("relay_session_outcomes_total", "outcome" => outcome).increment(1);
    counter!("relay_bytes_total").increment(bytes);
}
