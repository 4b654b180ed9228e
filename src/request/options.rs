//! Per-call option overrides.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Proxy behaviour for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyOverride {
    /// Follow the proxy policy.
    #[default]
    Auto,
    /// Use the configured proxy even for internal targets.
    Always,
    /// Never use the proxy.
    Never,
}

/// Typed overrides for timeouts, proxy and headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CallOptions {
    /// Total timeout in milliseconds.
    pub timeout: Option<u64>,
    /// Connect timeout in milliseconds.
    #[serde(alias = "connectTimeout")]
    pub connect_timeout: Option<u64>,
    pub proxy: ProxyOverride,
    pub headers: BTreeMap<String, String>,
}

impl CallOptions {
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Some(ms);
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout = Some(ms);
        self
    }

    pub fn proxy(mut self, proxy: ProxyOverride) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Layer `other` on top of `self`: timeouts take the larger value, a
    /// non-`Auto` proxy override replaces ours, headers from `other` win.
    pub fn layered(&self, other: &CallOptions) -> CallOptions {
        let mut headers = self.headers.clone();
        headers.extend(other.headers.iter().map(|(k, v)| (k.clone(), v.clone())));

        CallOptions {
            timeout: max_opt(self.timeout, other.timeout),
            connect_timeout: max_opt(self.connect_timeout, other.connect_timeout),
            proxy: match other.proxy {
                ProxyOverride::Auto => self.proxy,
                forced => forced,
            },
            headers,
        }
    }
}

fn max_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
