//! Forward proxy library: plain HTTP relay, CONNECT tunneling and access alerts.

pub mod audit;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod tunnel;

pub use audit::{AccessLog, AccessNotifier, NotificationEntry};
pub use config::schema::ProxyConfig;
pub use error::{ProxyError, Route};
pub use http::{AppState, ProxyServer};
pub use lifecycle::Shutdown;
