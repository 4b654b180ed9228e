//! Client facade.
//!
//! `RpcClient` is built once per process from a validated config and hands
//! out single-use `RequestContext`s. It is cheap to clone and safe to share.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{load_config, validate_config, RpcConfig};
use crate::driver::{DriverKind, Settings};
use crate::error::{ErrorKind, RpcError, LOCAL_FAILURE_CODE};
use crate::observability::{sink_from_config, LogSink};
use crate::request::{CallSpec, RequestContext, Token};
use crate::transport::{RpcTransport, YarTransport};

/// Transport selected at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Http,
    BinaryRpc,
}

impl FromStr for TransportKind {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(TransportKind::Http),
            "binary-rpc" | "binary_rpc" | "yar" => Ok(TransportKind::BinaryRpc),
            other => Err(RpcError::new(
                ErrorKind::Validation,
                format!("unknown transport '{other}', expected 'http' or 'binary-rpc'"),
                LOCAL_FAILURE_CODE,
            )),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Http => f.write_str("http"),
            TransportKind::BinaryRpc => f.write_str("binary-rpc"),
        }
    }
}

/// Entry point for issuing calls.
#[derive(Debug, Clone)]
pub struct RpcClient {
    kind: TransportKind,
    settings: Arc<Settings>,
    driver: DriverKind,
}

impl RpcClient {
    /// Validate `config` and build a client for `kind`.
    pub fn initialize(kind: TransportKind, config: RpcConfig) -> Result<Self, RpcError> {
        validate_config(&config).map_err(|errors| {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            RpcError::new(ErrorKind::Validation, format!("invalid config: {message}"), LOCAL_FAILURE_CODE)
        })?;

        let driver = match kind {
            TransportKind::Http => DriverKind::Http,
            TransportKind::BinaryRpc => {
                DriverKind::BinaryRpc(Arc::new(YarTransport::new(config.packager)))
            }
        };

        tracing::info!(
            transport = %kind,
            server = %config.server,
            server_type = ?config.server_type,
            timeout_ms = config.timeout,
            signing = config.sign.enable,
            "RPC client initialized"
        );

        let log_sink = sink_from_config(&config.logs);
        Ok(Self {
            kind,
            settings: Arc::new(Settings::new(config, log_sink)),
            driver,
        })
    }

    /// Load a TOML config file and initialize.
    pub fn from_file(kind: TransportKind, path: &Path) -> Result<Self, RpcError> {
        let config = load_config(path).map_err(|e| {
            RpcError::new(ErrorKind::Validation, e.to_string(), LOCAL_FAILURE_CODE)
        })?;
        Self::initialize(kind, config)
    }

    /// Replace the log sink chosen by `logs.driver`.
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        Arc::make_mut(&mut self.settings).log_sink = Some(sink);
        self
    }

    /// Use a custom wire implementation for the binary RPC transport.
    pub fn with_rpc_transport(mut self, transport: Arc<dyn RpcTransport>) -> Self {
        self.kind = TransportKind::BinaryRpc;
        self.driver = DriverKind::BinaryRpc(transport);
        self
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.kind
    }

    pub fn config(&self) -> &RpcConfig {
        &self.settings.config
    }

    /// Create a context for `calls`. Nothing is validated or sent until
    /// `RequestContext::get`.
    pub fn build_request(
        &self,
        calls: Vec<CallSpec>,
        token: impl Into<Token>,
        parallel: bool,
    ) -> RequestContext {
        RequestContext::new(
            Arc::clone(&self.settings),
            self.driver.clone(),
            calls,
            token.into(),
            parallel,
        )
    }
}
