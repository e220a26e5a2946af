//! Connection identity and live-tunnel tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count live tunnels so shutdown can wait for them to unwind
//! - Keep the active-tunnel gauge in step with the count

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a handled request or tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks live tunnels for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct TunnelTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    active: AtomicU64,
    idle: Notify,
}

impl TunnelTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new live tunnel. Returns a guard that decrements on drop.
    pub fn track(&self, id: ConnectionId) -> TunnelGuard {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        metrics::tunnel_opened();
        TunnelGuard {
            inner: Arc::clone(&self.inner),
            id,
        }
    }

    /// Current number of live tunnels.
    pub fn active_count(&self) -> u64 {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Wait until no tunnel is live or `timeout` elapses. Returns `true` when idle.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.inner.idle.notified();
                if self.active_count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

/// Guard that tracks one tunnel's lifetime.
#[derive(Debug)]
pub struct TunnelGuard {
    inner: Arc<TrackerInner>,
    id: ConnectionId,
}

impl TunnelGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for TunnelGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
        metrics::tunnel_closed();
        tracing::trace!(connection_id = %self.id, "Tunnel released");
    }
}
