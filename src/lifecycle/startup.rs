//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the access log and load TLS material
//! - Start the alert delivery worker and the optional metrics endpoint
//! - Bind listeners and begin accepting traffic
//! - Drive the ordered shutdown once a signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::audit::{AccessLog, AccessNotifier};
use crate::config::{ConfigError, ProxyConfig};
use crate::http::{AppState, ProxyServer};
use crate::lifecycle::{signals, Shutdown};
use crate::net::tls::load_tls_config;
use crate::observability::metrics;

/// Errors that stop the process.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot open access log {path}: {source}")]
    AccessLog {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot load TLS material: {0}")]
    Tls(std::io::Error),
    #[error("cannot build alert client: {0}")]
    Notifier(#[from] reqwest::Error),
    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("listener failed: {0}")]
    Listener(std::io::Error),
}

/// Run the proxy until a shutdown signal arrives or a listener fails.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    let log = AccessLog::open(Path::new(&config.access_log.path)).map_err(|source| {
        StartupError::AccessLog {
            path: config.access_log.path.clone(),
            source,
        }
    })?;
    let log = Arc::new(log);

    let tls = if config.tls.enabled {
        let rustls = load_tls_config(
            Path::new(&config.tls.cert_path),
            Path::new(&config.tls.key_path),
        )
        .await
        .map_err(StartupError::Tls)?;
        Some(rustls)
    } else {
        None
    };

    let (notifier, worker) = AccessNotifier::new(Arc::clone(&log), &config.notifier)?;
    let worker = tokio::spawn(worker.run());

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (plain_listener, tls_listener) = bind_listeners(&config)?;

    let state = AppState::new(&config, notifier);
    let tunnels = state.tunnels.clone();
    let tunnel_shutdown = state.shutdown.clone();
    let server = Arc::new(ProxyServer::new(state));
    let shutdown = Shutdown::new();
    let grace = config.shutdown.grace();

    let mut listeners = JoinSet::new();
    {
        let server = Arc::clone(&server);
        let signal = shutdown.subscribe();
        listeners.spawn(async move { server.run(plain_listener, signal, grace).await });
    }
    if let (Some(listener), Some(rustls)) = (tls_listener, tls) {
        let server = Arc::clone(&server);
        let signal = shutdown.subscribe();
        listeners.spawn(async move { server.run_tls(listener, rustls, signal, grace).await });
    }
    drop(server);

    let mut failure = None;
    tokio::select! {
        _ = signals::wait_for_signal() => {
            tracing::info!("Shutdown signal received");
        }
        Some(joined) = listeners.join_next() => {
            failure = listener_failure(joined);
        }
    }

    shutdown.trigger();
    tunnel_shutdown.cancel();
    if !tunnels.wait_idle(grace).await {
        tracing::warn!(remaining = tunnels.active_count(), "Tunnels still open after grace period");
    }

    let drained = tokio::time::timeout(grace, async {
        let mut first = None;
        while let Some(joined) = listeners.join_next().await {
            if let Some(e) = listener_failure(joined) {
                first.get_or_insert(e);
            }
        }
        first
    })
    .await;
    match drained {
        Ok(Some(e)) => {
            failure.get_or_insert(e);
        }
        Ok(None) => {}
        Err(_) => {
            tracing::warn!("Listeners still draining after grace period, aborting");
            listeners.abort_all();
            while listeners.join_next().await.is_some() {}
        }
    }

    // Every notifier clone is gone with the server; the worker drains and exits.
    if tokio::time::timeout(grace, worker).await.is_err() {
        tracing::warn!("Alert worker did not drain before the grace period ended");
    }
    if let Err(e) = log.flush() {
        tracing::error!(error = %e, "Access log flush failed");
    }

    match failure {
        Some(e) => Err(StartupError::Listener(e)),
        None => {
            tracing::info!("Shutdown complete");
            Ok(())
        }
    }
}

/// Bind every listening socket before any of them starts serving.
///
/// The TLS socket is bound only when the TLS listener is enabled.
fn bind_listeners(
    config: &ProxyConfig,
) -> Result<(std::net::TcpListener, Option<std::net::TcpListener>), StartupError> {
    let bind = |address: &str| {
        std::net::TcpListener::bind(address).map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
    };

    let plain = bind(&config.listener.http_address)?;
    let tls = if config.tls.enabled {
        Some(bind(&config.listener.https_address)?)
    } else {
        None
    };
    Ok((plain, tls))
}

fn listener_failure(
    joined: Result<Result<(), std::io::Error>, tokio::task::JoinError>,
) -> Option<std::io::Error> {
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Listener failed");
            Some(e)
        }
        Err(e) => {
            tracing::error!(error = %e, "Listener task aborted");
            Some(std::io::Error::new(std::io::ErrorKind::Other, e))
        }
    }
}
