//! HTTP CONNECT handling.
//!
//! Handles `CONNECT host[:port]` requests by:
//! 1. Resolving the target (port 443 when omitted) and recording the access
//! 2. Dialing the upstream with a bounded timeout
//! 3. Taking the connection's upgrade handle
//! 4. Returning `200 Connection Established`
//! 5. Relaying bytes bidirectionally once hyper hands the raw stream over
//!
//! The proxy never terminates the tunneled TLS; it only moves bytes.

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use hyper::ext::ReasonPhrase;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::error::{ProxyError, Result, Route};
use crate::http::request::RequestTimer;
use crate::http::rewrite::{self, OutboundTarget};
use crate::http::server::AppState;
use crate::tunnel::session::TunnelSession;

/// Handle one CONNECT request.
pub async fn handle(
    state: &AppState,
    mut request: Request<Body>,
    client_ip: &str,
    mut timer: RequestTimer,
) -> Response<Body> {
    let (target, upstream, on_upgrade) = match establish(state, &mut request, client_ip).await {
        Ok(parts) => parts,
        Err(e) => {
            tracing::warn!(request_id = %timer.id(), client_ip = %client_ip, error = %e, "CONNECT failed");
            timer.set_status(e.status());
            return e.into_response();
        }
    };

    timer.set_status(StatusCode::OK);
    let tunnels = state.tunnels.clone();
    let cancel = state.shutdown.child_token();

    tokio::spawn(async move {
        let id = timer.id();
        let upgraded = match on_upgrade.await {
            Ok(upgraded) => upgraded,
            Err(e) => {
                tracing::warn!(connection_id = %id, target_host = %target, error = %e, "Connection upgrade failed");
                return;
            }
        };

        let _guard = tunnels.track(id);
        tracing::debug!(connection_id = %id, target_host = %target, "Tunnel established");
        let stats = TunnelSession::new(id, TokioIo::new(upgraded), upstream, cancel)
            .run()
            .await;
        tracing::debug!(
            connection_id = %id,
            target_host = %target,
            sent = stats.client_to_upstream,
            received = stats.upstream_to_client,
            "Tunnel closed"
        );
        drop(timer);
    });

    connection_established()
}

async fn establish(
    state: &AppState,
    request: &mut Request<Body>,
    client_ip: &str,
) -> Result<(OutboundTarget, TcpStream, OnUpgrade)> {
    let target = rewrite::resolve_connect_target(request.uri())?;
    state.notifier.record(client_ip, &target.authority());

    let upstream = dial(&target.authority(), state.connect_timeout).await?;

    // Taking the handle out of the request makes it awaitable exactly once.
    let on_upgrade = request
        .extensions_mut()
        .remove::<OnUpgrade>()
        .ok_or(ProxyError::HijackUnsupported)?;

    Ok((target, upstream, on_upgrade))
}

/// Dial `authority` within `timeout`.
pub async fn dial(authority: &str, timeout: Duration) -> Result<TcpStream> {
    let stream = within(authority, timeout, TcpStream::connect(authority)).await?;
    let _ = stream.set_nodelay(true);
    Ok(stream)
}

async fn within<T, F>(authority: &str, timeout: Duration, connect: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    let unreachable = |reason: String| ProxyError::UpstreamUnreachable {
        route: Route::Tunnel,
        target: authority.to_string(),
        reason,
    };

    match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(unreachable(e.to_string())),
        Err(_) => Err(unreachable(format!("connect timed out after {:?}", timeout))),
    }
}

/// The synthetic acknowledgment sent before the raw tunnel starts.
pub fn connection_established() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    response
        .extensions_mut()
        .insert(ReasonPhrase::from_static(b"Connection Established"));
    response
}
