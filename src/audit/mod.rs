//! Access auditing subsystem.
//!
//! # Data Flow
//! ```text
//! proxied connection (client ip, target)
//!     → AccessNotifier::record
//!         → sink.rs   (local line, synchronous, never fails the caller)
//!         → alert.rs  (NotificationEntry)
//!         → bounded queue (try_send, never blocks)
//!     → worker.rs (DeliveryWorker: retry with fixed backoff)
//!         → telegram.rs (HTTP POST)
//! ```
//!
//! # Design Decisions
//! - Recording is observational only: no error reaches the proxied request
//! - A full queue drops the alert instead of stalling the connection

pub mod alert;
pub mod sink;
pub mod telegram;
pub mod worker;

use std::sync::Arc;

use chrono::Local;
use tokio::sync::mpsc;

use crate::config::NotifierConfig;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

pub use alert::NotificationEntry;
pub use sink::{format_access_line, AccessLog};
pub use telegram::TelegramClient;
pub use worker::DeliveryWorker;

/// Records every proxied connection locally and queues an alert for it.
#[derive(Debug, Clone)]
pub struct AccessNotifier {
    log: Arc<AccessLog>,
    queue: mpsc::Sender<NotificationEntry>,
}

impl AccessNotifier {
    /// Build the notifier and the worker that drains its queue.
    ///
    /// The worker must be spawned by the caller; it stops once every clone of
    /// the notifier has been dropped.
    pub fn new(
        log: Arc<AccessLog>,
        config: &NotifierConfig,
    ) -> Result<(Self, DeliveryWorker), reqwest::Error> {
        let client = TelegramClient::new(config)?;
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let policy = RetryPolicy::new(config.max_attempts, config.backoff());
        let worker = DeliveryWorker::new(rx, client, policy, config.max_in_flight);

        Ok((Self::from_parts(log, tx), worker))
    }

    /// Assemble from an existing log and queue sender.
    pub fn from_parts(log: Arc<AccessLog>, queue: mpsc::Sender<NotificationEntry>) -> Self {
        Self { log, queue }
    }

    /// Record one proxied connection.
    pub fn record(&self, client_ip: &str, target: &str) {
        let line = format_access_line(&Local::now(), client_ip, target);
        if let Err(e) = self.log.append(&line) {
            tracing::error!(error = %e, client_ip = %client_ip, target_host = %target, "Access log write failed");
        }

        match self.queue.try_send(NotificationEntry::new(client_ip, target)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(entry)) => {
                tracing::warn!(target_host = %entry.target, "Alert queue full, dropping alert");
                metrics::record_notification("dropped");
            }
            Err(mpsc::error::TrySendError::Closed(entry)) => {
                tracing::warn!(target_host = %entry.target, "Alert queue closed, dropping alert");
                metrics::record_notification("dropped");
            }
        }
    }

    /// Flush the local sink.
    pub fn flush(&self) {
        if let Err(e) = self.log.flush() {
            tracing::error!(error = %e, "Access log flush failed");
        }
    }
}
