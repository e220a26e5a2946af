//! CONNECT tunnel subsystem.
//!
//! # Data Flow
//! ```text
//! CONNECT request (dispatcher)
//!     → connect.rs (resolve target, dial, take upgrade handle, 200 ack)
//!     → hyper completes the upgrade
//!     → session.rs (two directional pumps, shared cancellation)
//! ```
//!
//! # Design Decisions
//! - Dial before answering: a failed dial leaves the client connection untouched
//! - No tunnel deadline; a tunnel lives until either side closes
//! - Session tokens are children of the process shutdown token

pub mod connect;
pub mod session;

pub use session::{is_expected_teardown, Direction, TunnelSession, TunnelStats};
