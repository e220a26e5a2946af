//! Background delivery of queued alerts.
//!
//! # Responsibilities
//! - Drain the bounded alert queue
//! - Deliver each alert with a bounded number of attempts
//! - Log the final outcome; nothing flows back to the request path
//!
//! # Design Decisions
//! - A semaphore caps deliveries in flight so a slow endpoint cannot
//!   accumulate unbounded sleeping tasks
//! - When every sender is gone the worker finishes what it holds and exits

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::audit::alert::NotificationEntry;
use crate::audit::telegram::TelegramClient;
use crate::error::ProxyError;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

/// Consumes the alert queue until it is closed.
pub struct DeliveryWorker {
    rx: mpsc::Receiver<NotificationEntry>,
    client: Arc<TelegramClient>,
    policy: RetryPolicy,
    in_flight: Arc<Semaphore>,
}

impl DeliveryWorker {
    pub fn new(
        rx: mpsc::Receiver<NotificationEntry>,
        client: TelegramClient,
        policy: RetryPolicy,
        max_in_flight: usize,
    ) -> Self {
        Self {
            rx,
            client: Arc::new(client),
            policy,
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            max_attempts = self.policy.max_attempts,
            backoff_ms = self.policy.backoff.as_millis() as u64,
            "Alert delivery worker starting"
        );

        let mut deliveries = JoinSet::new();
        while let Some(entry) = self.rx.recv().await {
            let Ok(permit) = Arc::clone(&self.in_flight).acquire_owned().await else {
                break;
            };
            let client = Arc::clone(&self.client);
            let policy = self.policy;
            deliveries.spawn(async move {
                let _permit = permit;
                deliver(&client, policy, &entry).await;
            });

            while deliveries.try_join_next().is_some() {}
        }

        while deliveries.join_next().await.is_some() {}
        tracing::info!("Alert delivery worker stopped");
    }
}

/// Final outcome of one alert. Both outcomes are already logged.
#[derive(Debug)]
pub enum Delivery {
    Delivered { attempts: u32 },
    Dropped(ProxyError),
}

impl Delivery {
    pub fn attempts(&self) -> u32 {
        match self {
            Delivery::Delivered { attempts } => *attempts,
            Delivery::Dropped(ProxyError::NotificationDelivery { attempts, .. }) => *attempts,
            Delivery::Dropped(_) => 0,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered { .. })
    }
}

/// Deliver one alert under `policy`.
pub async fn deliver(
    client: &TelegramClient,
    policy: RetryPolicy,
    entry: &NotificationEntry,
) -> Delivery {
    let mut retry = policy.start();
    let mut last_error = String::new();

    while retry.begin_attempt() {
        match client.send(&entry.text).await {
            Ok(()) => {
                tracing::debug!(
                    target_host = %entry.target,
                    attempts = retry.attempts(),
                    "Alert delivered"
                );
                metrics::record_notification("delivered");
                return Delivery::Delivered {
                    attempts: retry.attempts(),
                };
            }
            Err(e) => {
                tracing::warn!(
                    target_host = %entry.target,
                    attempt = retry.attempts(),
                    error = %e,
                    "Alert delivery attempt failed"
                );
                last_error = e.to_string();
            }
        }

        if let Some(delay) = retry.next_delay() {
            tokio::time::sleep(delay).await;
        }
    }

    let err = ProxyError::NotificationDelivery {
        attempts: retry.attempts(),
        reason: last_error,
    };
    tracing::error!(
        client_ip = %entry.client_ip,
        target_host = %entry.target,
        error = %err,
        "Alert dropped"
    );
    metrics::record_notification("failed");
    Delivery::Dropped(err)
}
