//! Inbound request origin used to build forwarded headers.

use std::net::SocketAddr;

use reqwest::header::HeaderMap;

pub const DEFAULT_CLIENT_IP: &str = "127.0.0.1";

/// Whether the context serves an interactive caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerKind {
    Interactive,
    NonInteractive,
}

impl CallerKind {
    /// Value of the `env` header.
    pub fn env_marker(&self) -> &'static str {
        match self {
            CallerKind::Interactive => "browser",
            CallerKind::NonInteractive => "shell",
        }
    }
}

/// Address information of the request being served.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOrigin {
    pub forwarded_for: Option<String>,
    pub real_ip: Option<String>,
    pub client_ip: Option<String>,
    pub remote_addr: Option<String>,
}

impl ClientOrigin {
    pub fn from_headers(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            forwarded_for: get("x-forwarded-for"),
            real_ip: get("x-real-ip"),
            client_ip: get("client-ip"),
            remote_addr: remote_addr.map(|addr| addr.ip().to_string()),
        }
    }

    /// First available of forwarded-for (first hop), real IP, client IP,
    /// remote address.
    pub fn client_ip(&self) -> String {
        let forwarded = self
            .forwarded_for
            .as_deref()
            .and_then(|list| list.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        forwarded
            .or(self.real_ip.as_deref())
            .or(self.client_ip.as_deref())
            .or(self.remote_addr.as_deref())
            .unwrap_or(DEFAULT_CLIENT_IP)
            .to_string()
    }
}
