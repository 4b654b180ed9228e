//! Shared test utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rpc_courier::config::{DomainEntry, RpcConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One request as seen by the mock backend.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    /// Path plus query string.
    pub target: String,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("")
    }

    pub fn query_pairs(&self) -> HashMap<String, String> {
        let url = url::Url::parse(&format!("http://mock{}", self.target)).unwrap();
        url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// What the mock backend sends back.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl MockReply {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        Self { status, content_type: "application/octet-stream", body, delay: Duration::ZERO }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub type Captured = Arc<Mutex<Vec<CapturedRequest>>>;

/// Starts a backend whose replies are computed per request. Returns the
/// bound address and the list of requests received so far.
pub async fn start_programmable_backend<F, Fut>(handler: F) -> (SocketAddr, Captured)
where
    F: Fn(CapturedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockReply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let seen = Arc::clone(&captured);
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let handler = Arc::clone(&handler);
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                serve(socket, handler, seen).await;
            });
        }
    });

    (addr, captured)
}

/// Starts a backend that always answers with `status` and `body`.
pub async fn start_mock_backend(status: u16, body: &'static str) -> (SocketAddr, Captured) {
    start_programmable_backend(move |_| async move { MockReply::json(status, body) }).await
}

/// A local port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Domain-routed config sending every service in `services` to `addr`.
pub fn config_for(addr: SocketAddr, services: &[&str]) -> RpcConfig {
    let domain = services
        .iter()
        .map(|name| (name.to_string(), DomainEntry::Plain(addr.to_string())))
        .collect();
    RpcConfig { domain, timeout: 2000, connect_timeout: 500, ..RpcConfig::default() }
}

async fn serve<F, Fut>(mut socket: TcpStream, handler: Arc<F>, seen: Captured)
where
    F: Fn(CapturedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockReply> + Send + 'static,
{
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    seen.lock().unwrap().push(request.clone());

    let reply = handler(request).await;
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        status_text(reply.status),
        reply.content_type,
        reply.body.len()
    );
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(&reply.body).await;
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let mut headers = HashMap::new();
    for line in lines.filter(|l| !l.is_empty()) {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = buf[head_end..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(CapturedRequest { method, target, headers, body })
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
