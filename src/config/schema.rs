//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.
//! Field names are snake_case; the camelCase spellings used by older
//! deployments are accepted as aliases.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Environment name that switches domain routing to suffix mode.
pub const LOCAL_SERVER: &str = "local";

/// Root configuration for the RPC client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Environment name (`"local"` is special-cased by domain routing).
    pub server: String,

    /// Routing mode selector.
    #[serde(alias = "serverType")]
    pub server_type: ServerType,

    /// Allow-list of module names for module-based routing.
    pub module: Vec<String>,

    /// Per-service routing table for domain-based routing.
    pub domain: HashMap<String, DomainEntry>,

    /// Shared root domain (module mode) or host suffix (local mode).
    #[serde(alias = "rootDomain")]
    pub root_domain: String,

    /// Port of the internal services; 443 switches the scheme to https.
    #[serde(alias = "serverPort")]
    pub server_port: u16,

    /// Total request timeout in milliseconds.
    pub timeout: u64,

    /// Connection establishment timeout in milliseconds.
    #[serde(alias = "connectTimeout")]
    pub connect_timeout: u64,

    /// Forward proxy used for external calls.
    pub proxy: Option<ProxyConfig>,

    /// External host name -> internal address substitutions.
    #[serde(alias = "intranetAddress")]
    pub intranet_address: HashMap<String, IntranetEntry>,

    /// Request signing.
    pub sign: SignConfig,

    /// Error surfacing and result envelope shape.
    pub error: ErrorConfig,

    /// Per-call log record flushing.
    #[serde(alias = "log")]
    pub logs: LogConfig,

    /// Header name carrying the caller token.
    #[serde(alias = "tokenKey")]
    pub token_key: String,

    /// Packaging format for the binary RPC transport.
    #[serde(alias = "yarPackageType")]
    pub packager: Packager,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            server: "production".to_string(),
            server_type: ServerType::Domain,
            module: Vec::new(),
            domain: HashMap::new(),
            root_domain: String::new(),
            server_port: 80,
            timeout: 5000,
            connect_timeout: 1000,
            proxy: None,
            intranet_address: HashMap::new(),
            sign: SignConfig::default(),
            error: ErrorConfig::default(),
            logs: LogConfig::default(),
            token_key: "token".to_string(),
            packager: Packager::Json,
        }
    }
}

impl RpcConfig {
    /// True when domain routing should build `{service}{root_domain}` hosts.
    pub fn is_local(&self) -> bool {
        self.server == LOCAL_SERVER
    }
}

/// Service resolution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// First path segment selects a module under one root domain.
    Module,
    /// First path segment selects an independently addressed service.
    #[serde(other)]
    Domain,
}

/// One entry of the per-service routing table.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DomainEntry {
    /// Plain domain, optionally with scheme (`"user.example.com"`).
    Plain(String),
    /// Addressed service: logical host plus the IP/port to connect to.
    Endpoint {
        host: String,
        #[serde(default)]
        ip: String,
        #[serde(default = "default_port")]
        port: u16,
    },
}

/// Intranet substitution target for an external host.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct IntranetEntry {
    /// Internal host name.
    #[serde(default)]
    pub host: String,

    /// Internal IP; preferred over `host` for the connection when set.
    #[serde(default)]
    pub ip: String,

    /// Internal port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl IntranetEntry {
    /// Address used for the connection.
    pub fn address(&self) -> &str {
        if self.ip.is_empty() {
            &self.host
        } else {
            &self.ip
        }
    }
}

fn default_port() -> u16 {
    80
}

/// Forward proxy address.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    /// Proxy URL in the form reqwest expects.
    pub fn url(&self) -> String {
        if self.host.contains("://") {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// Request signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SignConfig {
    /// Enable signing of resolved URLs.
    pub enable: bool,

    /// Shared secret prepended to the signed payload.
    pub secret: String,
}

/// Error surfacing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ErrorConfig {
    /// Raise typed errors instead of returning degraded envelopes.
    pub display_error: bool,

    /// Status field name of the result envelope.
    pub code_key: String,

    /// Message field name of the result envelope.
    pub msg_key: String,

    /// Status values considered successful.
    pub success_code: Vec<i64>,

    /// Status values considered failed; the first one fills degraded envelopes.
    pub fail_code: Vec<i64>,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            display_error: false,
            code_key: "status".to_string(),
            msg_key: "msg".to_string(),
            success_code: vec![1],
            fail_code: vec![0],
        }
    }
}

impl ErrorConfig {
    /// Status value written into degraded envelopes.
    pub fn fail_value(&self) -> i64 {
        self.fail_code.first().copied().unwrap_or(0)
    }

    /// Status value written into the fan-in envelope.
    pub fn success_value(&self) -> i64 {
        self.success_code.first().copied().unwrap_or(1)
    }
}

/// Where flushed log records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogDriver {
    /// No sink; records are discarded.
    #[default]
    None,
    /// Each record becomes a tracing event.
    Tracing,
    /// JSON lines appended to `<path>/<file>.log`.
    File,
}

/// Severity assigned to a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Debug => write!(f, "debug"),
        }
    }
}

/// Log flushing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Sink selection.
    pub driver: LogDriver,

    /// Log name passed to the sink.
    pub file: String,

    /// Directory used by the file sink.
    pub path: String,

    /// Levels that are flushed; empty disables flushing.
    pub levels: Vec<LogLevel>,

    /// Minimum call duration (ms) for `info` records to be flushed.
    #[serde(alias = "infoMinTime")]
    pub info_min_time: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            driver: LogDriver::None,
            file: "rpc".to_string(),
            path: "logs".to_string(),
            levels: vec![LogLevel::Error],
            info_min_time: 0,
        }
    }
}

/// Binary RPC packaging format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Packager {
    #[default]
    Json,
}

impl Packager {
    /// Name written into the 8-byte packager slot of a frame.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Packager::Json => "JSON",
        }
    }
}
