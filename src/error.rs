//! Error taxonomy for the proxy request path.
//!
//! Every per-connection failure is a [`ProxyError`]. Variants that can still
//! be answered over HTTP map to a status code through [`IntoResponse`]; the
//! remaining ones only ever reach the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Which relay produced an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Plain HTTP forwarding.
    Relay,
    /// CONNECT tunneling.
    Tunnel,
}

impl Route {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Relay => "http",
            Route::Tunnel => "connect",
        }
    }
}

/// Errors raised while handling one proxied connection.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The request target cannot be resolved to an upstream address.
    #[error("malformed request target: {0}")]
    MalformedRequest(String),

    /// Dial or round-trip to the upstream failed.
    #[error("upstream {target} unreachable: {reason}")]
    UpstreamUnreachable {
        route: Route,
        target: String,
        reason: String,
    },

    /// The accepted connection cannot be taken over for raw tunneling.
    #[error("connection takeover not supported for this request")]
    HijackUnsupported,

    /// I/O failure inside an established tunnel.
    #[error("tunnel transport error: {0}")]
    TunnelTransport(#[from] std::io::Error),

    /// The external push failed after every attempt.
    #[error("notification delivery failed after {attempts} attempt(s): {reason}")]
    NotificationDelivery { attempts: u32, reason: String },
}

impl ProxyError {
    /// Status code presented to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamUnreachable { route: Route::Relay, .. } => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamUnreachable { route: Route::Tunnel, .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ProxyError::HijackUnsupported
            | ProxyError::TunnelTransport(_)
            | ProxyError::NotificationDelivery { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> &'static str {
        match self {
            ProxyError::MalformedRequest(_) => "Invalid request URL",
            ProxyError::UpstreamUnreachable { route: Route::Relay, .. } => "Upstream request failed",
            ProxyError::UpstreamUnreachable { route: Route::Tunnel, .. } => {
                "Unable to connect to target server"
            }
            ProxyError::HijackUnsupported => "Connection takeover not supported",
            _ => "Internal proxy error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.client_message()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
