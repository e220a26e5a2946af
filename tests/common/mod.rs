//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use forward_proxy::audit::{AccessLog, AccessNotifier, NotificationEntry};
use forward_proxy::http::{AppState, ProxyServer};
use forward_proxy::lifecycle::Shutdown;
use forward_proxy::ProxyConfig;

/// Read up to and including the blank line ending an HTTP head.
pub async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte).await {
            Ok(0) | Err(_) => break,
            Ok(_) => head.push(byte[0]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Origin server answering every request with `body` and two `Set-Cookie` headers.
pub async fn start_mock_origin(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let mut discard = vec![0u8; content_length(&head)];
                let _ = socket.read_exact(&mut discard).await;

                let response = format!(
                    "HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Origin server that answers with a chunked body that never ends.
pub async fn start_endless_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let head = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                while socket.write_all(b"5\r\nchunk\r\n").await.is_ok() {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            });
        }
    });

    addr
}

/// Raw TCP echo server.
pub async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Messaging API stand-in.
///
/// `status_for(n)` decides the status of the n-th request (1-based).
pub struct MockMessagingApi {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicU32>,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl MockMessagingApi {
    pub async fn start<F>(status_for: F) -> Self
    where
        F: Fn(u32) -> u16 + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicU32::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let status_for = Arc::new(status_for);

        let (hit_counter, seen) = (Arc::clone(&hits), Arc::clone(&requests));
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let (hits, seen, status_for) =
                    (Arc::clone(&hit_counter), Arc::clone(&seen), Arc::clone(&status_for));
                tokio::spawn(async move {
                    let head = read_head(&mut socket).await;
                    let mut body = vec![0u8; content_length(&head)];
                    let _ = socket.read_exact(&mut body).await;

                    let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
                    seen.lock()
                        .unwrap()
                        .push(format!("{}{}", head, String::from_utf8_lossy(&body)));

                    let status = status_for(n);
                    let reply = r#"{"ok":true}"#;
                    let response = format!(
                        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        reply.len(),
                        reply
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr, hits, requests }
    }

    pub fn api_base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }
}

/// A running proxy whose alerts land in `alerts` instead of a worker.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub alerts: mpsc::Receiver<NotificationEntry>,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

/// Grace period used by test proxies.
pub const TEST_GRACE: Duration = Duration::from_millis(500);

/// Start the proxy on an ephemeral port, logging to `log_path`.
pub async fn start_proxy(log_path: &Path) -> TestProxy {
    let log = Arc::new(AccessLog::open(log_path).unwrap());
    let (tx, alerts) = mpsc::channel(64);
    let notifier = AccessNotifier::from_parts(log, tx);

    let mut config = ProxyConfig::default();
    config.tunnel.connect_timeout_secs = 2;
    let server = ProxyServer::new(AppState::new(&config, notifier));

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    let task = tokio::spawn(async move {
        let _ = server.run(listener, signal, TEST_GRACE).await;
    });

    TestProxy {
        addr,
        alerts,
        shutdown,
        task,
    }
}
