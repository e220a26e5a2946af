//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, dispatch by method)
//!     → request.rs (client IP, request timer)
//!     → CONNECT: tunnel::connect
//!     → otherwise: rewrite.rs (resolve target) → relay.rs (forward, stream back)
//! ```

pub mod relay;
pub mod request;
pub mod rewrite;
pub mod server;

pub use request::{extract_client_ip, RequestTimer};
pub use rewrite::{OutboundTarget, Scheme};
pub use server::{AppState, ProxyServer};
