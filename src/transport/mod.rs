//! Outbound transport plumbing shared by the drivers.
//!
//! # Data Flow
//! ```text
//! HttpDriver ──────────────► ClientCache ─► reqwest::Client (per connect timeout + proxy)
//! BinaryRpcDriver ─► RpcTransport::invoke(RpcRequest)
//!                        └─► YarTransport ─► ClientCache ─► framed POST
//! ```
//!
//! # Design Decisions
//! - Clients are cached inside one driver and dropped with its context
//! - The binary transport takes its timeouts per request
//! - reqwest failures are reported as curl-compatible transfer codes

pub mod yar;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::response::codes::transfer;

pub use yar::YarTransport;

/// One binary RPC invocation.
#[derive(Debug, Clone)]
pub struct RpcRequest {
    pub url: Url,
    pub method: String,
    pub params: Value,
    /// Header fields as `Key: value` lines.
    pub metadata: Vec<String>,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    /// Forward proxy URL when the call must be proxied.
    pub proxy: Option<String>,
    pub persistent: bool,
}

/// Failure reported by a binary RPC transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rpc status {status}: {message}")]
pub struct RpcFailure {
    pub status: u32,
    pub message: String,
}

impl RpcFailure {
    pub fn new(status: u32, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

/// Wire implementation behind the binary RPC driver.
///
/// `Ok` carries the encoded return value. A JSON return value is passed
/// as its JSON text; a string return value is passed through as is.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    async fn invoke(&self, request: RpcRequest) -> Result<String, RpcFailure>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    connect_timeout: Duration,
    proxy: Option<String>,
}

/// reqwest clients keyed by connect timeout and proxy.
#[derive(Debug, Default)]
pub struct ClientCache {
    clients: Mutex<HashMap<ClientKey, reqwest::Client>>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse or build the client for this connect timeout and proxy.
    pub fn get(
        &self,
        connect_timeout: Duration,
        proxy: Option<&str>,
    ) -> Result<reqwest::Client, reqwest::Error> {
        let key = ClientKey { connect_timeout, proxy: proxy.map(str::to_string) };
        let mut clients = self.clients.lock().expect("client cache lock poisoned");

        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let builder = reqwest::Client::builder().connect_timeout(connect_timeout);
        let builder = match proxy {
            Some(url) => builder.proxy(reqwest::Proxy::all(url)?),
            None => builder.no_proxy(),
        };
        let client = builder.build()?;

        tracing::debug!(
            connect_timeout_ms = connect_timeout.as_millis() as u64,
            proxy = ?proxy,
            "Built transport client"
        );

        clients.insert(key, client.clone());
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().expect("client cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Map a reqwest failure to a curl-compatible transfer code.
pub fn transfer_code(err: &reqwest::Error) -> u32 {
    if err.is_timeout() {
        return transfer::OPERATION_TIMEDOUT;
    }
    if err.is_connect() {
        let chain = error_chain(err).to_ascii_lowercase();
        if chain.contains("dns") || chain.contains("lookup address") {
            return transfer::COULDNT_RESOLVE_HOST;
        }
        if chain.contains("tls") || chain.contains("certificate") || chain.contains("handshake") {
            return transfer::SSL_CONNECT_ERROR;
        }
        return transfer::COULDNT_CONNECT;
    }
    if err.is_redirect() {
        transfer::TOO_MANY_REDIRECTS
    } else if err.is_builder() {
        transfer::URL_MALFORMAT
    } else if err.is_body() || err.is_decode() {
        transfer::RECV_ERROR
    } else if err.is_request() {
        transfer::SEND_ERROR
    } else {
        transfer::UNKNOWN
    }
}

/// Error message including every source in the chain.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
