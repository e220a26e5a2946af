//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection (plain or TLS listener)
//!     → tls.rs (certificate material for the TLS listener)
//!     → Hand off to HTTP layer (dispatcher)
//!     → connection.rs (ids for tracing, live-tunnel tracking)
//! ```
//!
//! # Design Decisions
//! - TLS material is loaded once at startup; failures are fatal
//! - Tunnels are counted so shutdown can wait for them

pub mod connection;
pub mod tls;

pub use connection::{ConnectionId, TunnelGuard, TunnelTracker};
