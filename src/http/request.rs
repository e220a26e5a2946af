//! Per-request helpers.
//!
//! # Responsibilities
//! - Derive the client IP used for auditing
//! - Measure how long each proxied exchange takes
//!
//! # Design Decisions
//! - The timer is a drop guard, so the measurement is emitted on every exit
//!   path, including client disconnects mid-transfer

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::{HeaderMap, StatusCode};

use crate::error::Route;
use crate::net::ConnectionId;
use crate::observability::metrics;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Client IP for auditing: first `X-Forwarded-For` entry, else the peer IP.
pub fn extract_client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

/// Drop guard logging the wall-clock duration of one proxied exchange.
#[derive(Debug)]
pub struct RequestTimer {
    id: ConnectionId,
    route: Route,
    client_ip: String,
    status: Option<StatusCode>,
    start: Instant,
}

impl RequestTimer {
    pub fn start(route: Route, client_ip: &str) -> Self {
        Self {
            id: ConnectionId::new(),
            route,
            client_ip: client_ip.to_string(),
            status: None,
            start: Instant::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let status = self.status.map(|s| s.as_u16()).unwrap_or(0);
        tracing::info!(
            request_id = %self.id,
            route = self.route.as_str(),
            client_ip = %self.client_ip,
            status,
            elapsed = ?self.start.elapsed(),
            "Request handling finished"
        );
        metrics::record_request(self.route.as_str(), status, self.start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "203.0.113.9:54321".parse().unwrap()
    }

    #[test]
    fn forwarded_for_takes_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.5, 10.0.0.1"));
        assert_eq!(extract_client_ip(&headers, peer()), "10.0.0.5");
    }

    #[test]
    fn falls_back_to_peer_host() {
        assert_eq!(extract_client_ip(&HeaderMap::new(), peer()), "203.0.113.9");
    }

    #[test]
    fn empty_forwarded_for_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" , 10.0.0.1"));
        assert_eq!(extract_client_ip(&headers, peer()), "203.0.113.9");
    }

    #[test]
    fn ipv6_peer_keeps_full_address() {
        let peer: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
        assert_eq!(extract_client_ip(&HeaderMap::new(), peer), "2001:db8::1");
    }
}
