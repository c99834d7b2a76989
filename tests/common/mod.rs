//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use stream_relay::config::{RelayConfig, ResolverConfig};
use stream_relay::{HttpServer, Shutdown};

/// A raw TCP upstream with an accepted-connection counter.
pub struct MockUpstream {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Start a programmable upstream. The handler receives the request head
/// (lowercased) and owns the socket for the rest of the exchange.
pub async fn start_mock_upstream<F, Fut>(handler: F) -> MockUpstream
where
    F: Fn(String, TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let head = read_request_head(&mut socket).await;
                        handler(head, socket).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockUpstream { addr, connections }
}

/// Start an upstream that answers every request with a fixed response.
pub async fn start_fixed_upstream(
    status_line: &'static str,
    headers: &'static [(&'static str, &'static str)],
    body: Vec<u8>,
) -> MockUpstream {
    let body = Arc::new(body);
    start_mock_upstream(move |_, socket| {
        let body = body.clone();
        async move { respond(socket, status_line, headers, &body).await }
    })
    .await
}

async fn read_request_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).to_ascii_lowercase()
}

/// Write a complete response with Content-Length and close.
pub async fn respond(
    mut socket: TcpStream,
    status_line: &str,
    headers: &[(&str, &str)],
    body: &[u8],
) {
    let mut response = format!("HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n", body.len());
    for (name, value) in headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str("\r\n");
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.write_all(body).await;
    let _ = socket.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Resolver that runs `script` under `sh -c`. Inside the script `$5` is the target.
pub fn script_resolver(script: &str) -> ResolverConfig {
    ResolverConfig {
        program: "sh".into(),
        format: "best".into(),
        extra_args: vec!["-c".into(), script.into(), "resolver".into()],
    }
}

/// Resolver that always prints `url`.
pub fn resolver_printing(url: &str) -> ResolverConfig {
    script_resolver(&format!("echo '{url}'"))
}

/// Relay config with test-friendly timeouts.
pub fn relay_config(resolver: ResolverConfig) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.resolver = resolver;
    config.timeouts.resolve_ms = 5_000;
    config.timeouts.connect_ms = 2_000;
    config.timeouts.read_ms = 5_000;
    config.timeouts.write_ms = 5_000;
    config
}

/// Start the relay on an ephemeral port. Keep the returned [`Shutdown`] alive
/// for as long as the server should run.
pub async fn start_relay(config: RelayConfig) -> (SocketAddr, Shutdown) {
    let (addr, shutdown, _server) = start_relay_with_handle(config).await;
    (addr, shutdown)
}

/// Like [`start_relay`], also returning the server task.
pub async fn start_relay_with_handle(
    config: RelayConfig,
) -> (SocketAddr, Shutdown, JoinHandle<std::io::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new(config.timeouts.drain());
    let server = HttpServer::new(config).unwrap();
    let server = tokio::spawn(server.run(listener, shutdown.subscribe()));
    (addr, shutdown, server)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// `/stream` URL on the relay for a given target.
pub fn stream_url(relay: SocketAddr, target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("http://{relay}/stream?url={encoded}")
}

/// Poll `check` until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
