//! Bidirectional byte pump for an established tunnel.
//!
//! # Responsibilities
//! - Copy client→upstream and upstream→client concurrently
//! - Tear both directions down as soon as either one ends
//! - Classify expected teardown so it stays out of the warning log
//!
//! # Design Decisions
//! - One `CancellationToken` per session; cancelling is idempotent
//! - Each stream half has exactly one owner, so every socket is released
//!   once, when the second half of its stream is dropped

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;
use crate::net::ConnectionId;
use crate::observability::metrics;

const COPY_BUFFER_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToUpstream,
    UpstreamToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToUpstream => "client_to_upstream",
            Direction::UpstreamToClient => "upstream_to_client",
        }
    }
}

/// How one direction ended.
#[derive(Debug)]
enum Ending {
    Eof,
    Cancelled,
    Teardown(io::Error),
    Failed(io::Error),
}

/// Bytes moved by a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TunnelStats {
    pub client_to_upstream: u64,
    pub upstream_to_client: u64,
}

/// A client stream and an upstream stream joined by one cancellation signal.
pub struct TunnelSession<C, U> {
    id: ConnectionId,
    client: C,
    upstream: U,
    cancel: CancellationToken,
}

impl<C, U> TunnelSession<C, U>
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    U: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(id: ConnectionId, client: C, upstream: U, cancel: CancellationToken) -> Self {
        Self {
            id,
            client,
            upstream,
            cancel,
        }
    }

    /// Handle that tears the session down from outside.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Pump until either side closes, fails, or the session is cancelled.
    pub async fn run(self) -> TunnelStats {
        let (client_read, client_write) = tokio::io::split(self.client);
        let (upstream_read, upstream_write) = tokio::io::split(self.upstream);

        let outbound = tokio::spawn(pump(
            self.id,
            Direction::ClientToUpstream,
            client_read,
            upstream_write,
            self.cancel.clone(),
        ));
        let inbound = tokio::spawn(pump(
            self.id,
            Direction::UpstreamToClient,
            upstream_read,
            client_write,
            self.cancel.clone(),
        ));

        let (outbound, inbound) = tokio::join!(outbound, inbound);
        // A panicked pump never reached its own cancel.
        self.cancel.cancel();

        TunnelStats {
            client_to_upstream: outbound.unwrap_or_default(),
            upstream_to_client: inbound.unwrap_or_default(),
        }
    }
}

async fn pump<R, W>(
    id: ConnectionId,
    direction: Direction,
    mut reader: R,
    mut writer: W,
    cancel: CancellationToken,
) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut copied = 0u64;
    let ending = tokio::select! {
        result = copy_counted(&mut reader, &mut writer, &mut copied) => match result {
            Ok(()) => Ending::Eof,
            Err(e) if is_expected_teardown(&e) => Ending::Teardown(e),
            Err(e) => Ending::Failed(e),
        },
        _ = cancel.cancelled() => Ending::Cancelled,
    };

    cancel.cancel();
    let _ = writer.shutdown().await;
    metrics::record_tunnel_bytes(direction.as_str(), copied);

    match ending {
        Ending::Eof => {
            tracing::debug!(connection_id = %id, direction = direction.as_str(), bytes = copied, "Tunnel direction reached EOF");
        }
        Ending::Cancelled => {
            tracing::debug!(connection_id = %id, direction = direction.as_str(), bytes = copied, "Tunnel direction cancelled");
        }
        Ending::Teardown(e) => {
            tracing::debug!(connection_id = %id, direction = direction.as_str(), error = %e, "Tunnel peer went away");
        }
        Ending::Failed(e) => {
            let err = ProxyError::TunnelTransport(e);
            tracing::warn!(connection_id = %id, direction = direction.as_str(), error = %err, "Tunnel transfer failed");
        }
    }

    copied
}

async fn copy_counted<R, W>(reader: &mut R, writer: &mut W, copied: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *copied += n as u64;
    }
}

/// Errors produced when the other side, or the sibling direction, has already closed.
pub fn is_expected_teardown(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
    )
}
