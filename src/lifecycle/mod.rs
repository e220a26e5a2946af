//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Open access log → Load TLS → Start alert worker → Start listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Cancel tunnels → Drain alerts → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then sinks, then listeners
//! - Shutdown has a grace period: live tunnels are abandoned after it

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, StartupError};
