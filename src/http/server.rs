//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Build the Axum router around a single catch-all dispatcher
//! - Serve the plain listener and the TLS listener with the same router
//! - Route CONNECT to the tunnel, everything else to the relay
//! - Stop accepting on shutdown

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request},
    response::Response,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::audit::AccessNotifier;
use crate::config::ProxyConfig;
use crate::error::Route;
use crate::http::relay::{self, UpstreamClient};
use crate::http::request::{extract_client_ip, RequestTimer};
use crate::net::TunnelTracker;
use crate::tunnel::connect;

/// Application state injected into the dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub client: UpstreamClient,
    pub notifier: AccessNotifier,
    pub connect_timeout: Duration,
    pub tunnels: TunnelTracker,
    /// Parent of every tunnel's cancellation token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: &ProxyConfig, notifier: AccessNotifier) -> Self {
        Self {
            client: relay::build_client(),
            notifier,
            connect_timeout: config.tunnel.connect_timeout(),
            tunnels: TunnelTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// HTTP server for the forward proxy.
pub struct ProxyServer {
    router: Router,
}

impl ProxyServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        // CONNECT targets carry no path, so only the fallback can see every request.
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The underlying router, for driving the dispatcher without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP on `listener` until a shutdown signal arrives.
    ///
    /// Open connections get `grace` to finish; whatever is still running
    /// after that is dropped.
    pub async fn run(
        &self,
        listener: std::net::TcpListener,
        shutdown: broadcast::Receiver<()>,
        grace: Duration,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP proxy listener started");

        let app = self.router.clone().into_make_service_with_connect_info::<SocketAddr>();
        axum_server::from_tcp(listener)
            .handle(shutdown_handle(shutdown, grace))
            .serve(app)
            .await?;

        tracing::info!(address = %addr, "HTTP proxy listener stopped");
        Ok(())
    }

    /// Serve TLS-terminated traffic on `listener` until a shutdown signal arrives.
    pub async fn run_tls(
        &self,
        listener: std::net::TcpListener,
        tls: RustlsConfig,
        shutdown: broadcast::Receiver<()>,
        grace: Duration,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTPS proxy listener started");

        let app = self.router.clone().into_make_service_with_connect_info::<SocketAddr>();
        axum_server::from_tcp_rustls(listener, tls)
            .handle(shutdown_handle(shutdown, grace))
            .serve(app)
            .await?;

        tracing::info!(address = %addr, "HTTPS proxy listener stopped");
        Ok(())
    }
}

/// Server handle that starts a graceful shutdown bounded by `grace` once
/// the broadcast fires.
fn shutdown_handle(mut shutdown: broadcast::Receiver<()>, grace: Duration) -> axum_server::Handle {
    let handle = axum_server::Handle::new();
    let signal_handle = handle.clone();
    tokio::spawn(async move {
        let _ = shutdown.recv().await;
        signal_handle.graceful_shutdown(Some(grace));
    });
    handle
}

/// Route CONNECT to the tunnel, everything else to the relay.
async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let client_ip = extract_client_ip(request.headers(), peer);
    tracing::debug!(
        client_ip = %client_ip,
        method = %request.method(),
        uri = %request.uri(),
        "Dispatching request"
    );

    if request.method() == Method::CONNECT {
        let timer = RequestTimer::start(Route::Tunnel, &client_ip);
        connect::handle(&state, request, &client_ip, timer).await
    } else {
        let timer = RequestTimer::start(Route::Relay, &client_ip);
        relay::forward(&state, request, &client_ip, timer).await
    }
}
