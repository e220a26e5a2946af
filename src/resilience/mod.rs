//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Alert delivery:
//!     → retry.rs (attempt ceiling, fixed backoff between attempts)
//! Upstream dial:
//!     → tokio::time::timeout around the connect (tunnel::connect)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - The proxy never retries client traffic; only alerts are retried

pub mod retry;

pub use retry::{RetryPolicy, RetryState};
