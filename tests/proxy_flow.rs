//! End-to-end tests for the plain relay and the CONNECT tunnel.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

fn log_lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[tokio::test]
async fn connect_tunnel_relays_bytes_and_records_once() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("access.log");
    let echo = common::start_echo_server().await;
    let mut proxy = common::start_proxy(&log_path).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    let connect = format!("CONNECT {echo} HTTP/1.1\r\nHost: {echo}\r\n\r\n");
    client.write_all(connect.as_bytes()).await.unwrap();

    let head = common::read_head(&mut client).await;
    assert!(
        head.starts_with("HTTP/1.1 200 Connection Established\r\n"),
        "unexpected head: {head:?}"
    );

    client.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut echoed))
        .await
        .expect("tunnel stalled")
        .unwrap();
    assert_eq!(&echoed, b"ping");

    client.write_all(b"pong, twice").await.unwrap();
    let mut echoed = [0u8; 11];
    client.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"pong, twice");

    let lines = log_lines(&log_path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(&format!("] 127.0.0.1 -> {echo}")));

    let entry = proxy.alerts.try_recv().unwrap();
    assert_eq!(entry.client_ip, "127.0.0.1");
    assert_eq!(entry.target, echo.to_string());
    assert!(proxy.alerts.try_recv().is_err());

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn connect_honours_forwarded_for() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("access.log");
    let echo = common::start_echo_server().await;
    let mut proxy = common::start_proxy(&log_path).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    let connect = format!(
        "CONNECT {echo} HTTP/1.1\r\nHost: {echo}\r\nX-Forwarded-For: 10.0.0.5, 10.0.0.6\r\n\r\n"
    );
    client.write_all(connect.as_bytes()).await.unwrap();
    let head = common::read_head(&mut client).await;
    assert!(head.starts_with("HTTP/1.1 200"));

    assert_eq!(proxy.alerts.try_recv().unwrap().client_ip, "10.0.0.5");
    assert!(log_lines(&log_path)[0].ends_with(&format!("] 10.0.0.5 -> {echo}")));
}

#[tokio::test]
async fn connect_to_closed_port_is_service_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let closed = common::closed_port().await;
    let proxy = common::start_proxy(&dir.path().join("access.log")).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    let connect = format!("CONNECT {closed} HTTP/1.1\r\nHost: {closed}\r\n\r\n");
    client.write_all(connect.as_bytes()).await.unwrap();

    let head = common::read_head(&mut client).await;
    assert!(head.starts_with("HTTP/1.1 503"), "unexpected head: {head:?}");
}

#[tokio::test]
async fn plain_request_is_relayed_with_duplicate_headers() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("access.log");
    let origin = common::start_mock_origin("hello from origin").await;
    let mut proxy = common::start_proxy(&log_path).await;

    let client = reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{}", proxy.addr)).unwrap())
        .build()
        .unwrap();
    let res = client
        .get(format!("http://{origin}/greeting?lang=en"))
        .send()
        .await
        .expect("proxy unreachable");

    assert_eq!(res.status(), 200);
    let cookies: Vec<_> = res
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_owned())
        .collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);
    assert_eq!(res.text().await.unwrap(), "hello from origin");

    let lines = log_lines(&log_path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(&format!("] 127.0.0.1 -> {origin}")));
    assert_eq!(proxy.alerts.try_recv().unwrap().target, origin.to_string());
}

#[tokio::test]
async fn plain_request_to_closed_upstream_is_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let closed = common::closed_port().await;
    let proxy = common::start_proxy(&dir.path().join("access.log")).await;

    let client = reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{}", proxy.addr)).unwrap())
        .build()
        .unwrap();
    let res = client.get(format!("http://{closed}/")).send().await.unwrap();

    assert_eq!(res.status(), 502);
}

#[tokio::test]
async fn origin_form_request_is_rejected_without_audit() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("access.log");
    let mut proxy = common::start_proxy(&log_path).await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    client
        .write_all(b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n")
        .await
        .unwrap();

    let head = common::read_head(&mut client).await;
    assert!(head.starts_with("HTTP/1.1 400"), "unexpected head: {head:?}");
    assert!(log_lines(&log_path).is_empty());
    assert!(proxy.alerts.try_recv().is_err());
}

#[tokio::test]
async fn shutdown_cuts_long_relay_after_grace() {
    let dir = tempfile::tempdir().unwrap();
    let origin = common::start_endless_origin().await;
    let proxy = common::start_proxy(&dir.path().join("access.log")).await;

    let client = reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{}", proxy.addr)).unwrap())
        .build()
        .unwrap();
    let mut res = client.get(format!("http://{origin}/stream")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.chunk().await.unwrap().is_some());

    proxy.shutdown.trigger();

    tokio::time::timeout(Duration::from_secs(3), proxy.task)
        .await
        .expect("listener outlived its grace period")
        .unwrap();
}
