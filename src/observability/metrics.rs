//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): handled requests by route, status
//! - `proxy_request_duration_seconds` (histogram): handling time by route
//! - `proxy_active_tunnels` (gauge): live CONNECT tunnels
//! - `proxy_tunnel_bytes_total` (counter): relayed bytes by direction
//! - `proxy_notifications_total` (counter): alert outcomes
//!
//! Recording is a no-op until a recorder is installed, so the functions are
//! safe to call from tests.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &'static str, status: u16, start: Instant) {
    counter!("proxy_requests_total", "route" => route, "status" => status.to_string()).increment(1);
    histogram!("proxy_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn tunnel_opened() {
    gauge!("proxy_active_tunnels").increment(1.0);
}

pub fn tunnel_closed() {
    gauge!("proxy_active_tunnels").decrement(1.0);
}

pub fn record_tunnel_bytes(direction: &'static str, bytes: u64) {
    counter!("proxy_tunnel_bytes_total", "direction" => direction).increment(bytes);
}

pub fn record_notification(outcome: &'static str) {
    counter!("proxy_notifications_total", "outcome" => outcome).increment(1);
}
