//! Plain HTTP forwarding.
//!
//! # Responsibilities
//! - Resolve the absolute target and record the access
//! - Send the request upstream over a fresh connection
//! - Stream the response back with every header preserved
//!
//! # Design Decisions
//! - No idle pooling: each request dials its own upstream connection
//! - No retries; the client may reissue
//! - Body errors after the head is committed are logged only

use axum::body::Body;
use axum::http::{Request, Response, Version};
use http_body_util::BodyExt;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::error::{ProxyError, Result, Route};
use crate::http::request::RequestTimer;
use crate::http::rewrite;
use crate::http::server::AppState;

/// Outbound client used for plain HTTP (and absolute `https://`) targets.
pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Build the outbound client.
pub fn build_client() -> UpstreamClient {
    crate::net::tls::install_crypto_provider();

    let connector = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();

    Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(0)
        .build(connector)
}

/// Forward one non-CONNECT request.
pub async fn forward(
    state: &AppState,
    request: Request<Body>,
    client_ip: &str,
    mut timer: RequestTimer,
) -> Response<Body> {
    let upstream = match send_upstream(state, request, client_ip).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(request_id = %timer.id(), client_ip = %client_ip, error = %e, "Relay failed");
            timer.set_status(e.status());
            return axum::response::IntoResponse::into_response(e);
        }
    };

    timer.set_status(upstream.status());
    let (parts, body) = upstream.into_parts();

    // The timer rides along with the body so the measurement covers the transfer.
    let body = body.map_err(move |e| {
        tracing::warn!(request_id = %timer.id(), error = %e, "Response body transfer failed");
        e
    });

    let mut response = Response::new(Body::new(body));
    *response.status_mut() = parts.status;
    for (name, value) in parts.headers.iter() {
        response.headers_mut().append(name.clone(), value.clone());
    }
    response
}

async fn send_upstream(
    state: &AppState,
    request: Request<Body>,
    client_ip: &str,
) -> Result<Response<hyper::body::Incoming>> {
    let (mut parts, body) = request.into_parts();
    let (target, uri) = rewrite::rewrite_uri(&parts.uri)?;

    state.notifier.record(client_ip, &target.authority());

    tracing::debug!(method = %parts.method, uri = %uri, "Forwarding request");
    parts.uri = uri;
    parts.version = Version::HTTP_11;
    parts.extensions.clear();

    state
        .client
        .request(Request::from_parts(parts, body))
        .await
        .map_err(|e| ProxyError::UpstreamUnreachable {
            route: Route::Relay,
            target: target.authority(),
            reason: error_chain(&e),
        })
}

/// Render an error with its sources, outermost first.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}
