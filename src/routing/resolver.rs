//! Service reference resolution.
//!
//! Turns an internal service reference (`/user/info/get`) or an external
//! URL into the concrete URL a driver will call, including the correlation
//! parameter and the proxy decision.

use std::sync::Arc;

use url::Url;

use crate::config::{DomainEntry, RpcConfig, ServerType};
use crate::error::CallError;
use crate::routing::proxy::ProxyPolicy;

/// Query parameter carrying the request id.
pub const CORRELATION_PARAM: &str = "wr_id";

/// Outcome of resolving one service reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// URL to connect to, `wr_id` included.
    pub real_url: Url,
    /// Logical host to send as the `Host` header when the connection
    /// target was substituted.
    pub real_host: Option<String>,
    /// Route the call through the forward proxy.
    pub needs_proxy: bool,
}

/// Maps service references to concrete URLs using the routing config.
#[derive(Debug, Clone)]
pub struct Resolver {
    config: Arc<RpcConfig>,
    proxy_policy: ProxyPolicy,
}

impl Resolver {
    pub fn new(config: Arc<RpcConfig>) -> Self {
        let proxy_policy = ProxyPolicy::new(&config.intranet_address);
        Self { config, proxy_policy }
    }

    pub fn proxy_policy(&self) -> &ProxyPolicy {
        &self.proxy_policy
    }

    /// Resolve `service_ref` and tag the result with `request_id`.
    pub fn resolve(
        &self,
        service_ref: &str,
        is_external: bool,
        request_id: &str,
    ) -> Result<ResolvedTarget, CallError> {
        let mut target = if is_external {
            self.resolve_external(service_ref)?
        } else {
            self.resolve_internal(service_ref)?
        };

        target
            .real_url
            .query_pairs_mut()
            .append_pair(CORRELATION_PARAM, request_id);

        tracing::trace!(
            service_ref = %service_ref,
            url = %target.real_url,
            proxy = target.needs_proxy,
            "Resolved service reference"
        );

        Ok(target)
    }

    fn resolve_internal(&self, service_ref: &str) -> Result<ResolvedTarget, CallError> {
        let trimmed = service_ref.trim().trim_start_matches('/');
        let (first, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
        let name = first.trim_matches('_');

        if name.is_empty() {
            return Err(CallError::Resolution(format!(
                "service reference '{service_ref}' has no module or service segment"
            )));
        }

        let (raw, real_host) = match self.config.server_type {
            ServerType::Module => (self.module_url(name, rest)?, None),
            ServerType::Domain => self.domain_url(name, rest)?,
        };

        let real_url = Url::parse(&raw)
            .map_err(|e| CallError::Resolution(format!("invalid url '{raw}': {e}")))?;

        Ok(ResolvedTarget { real_url, real_host, needs_proxy: false })
    }

    fn module_url(&self, name: &str, rest: &str) -> Result<String, CallError> {
        if !self.config.module.iter().any(|m| m == name) {
            return Err(CallError::Resolution(format!("module '{name}' is not configured")));
        }

        let root = strip_scheme(self.config.root_domain.trim().trim_end_matches('/'));
        let (root_host, root_path) = match root.find('/') {
            Some(idx) => root.split_at(idx),
            None => (root, ""),
        };
        let (scheme, authority) = scheme_and_authority(root_host, self.config.server_port);

        Ok(format!("{scheme}://{authority}{root_path}/{name}/{rest}"))
    }

    fn domain_url(&self, name: &str, rest: &str) -> Result<(String, Option<String>), CallError> {
        let entry = self
            .config
            .domain
            .get(name)
            .ok_or_else(|| CallError::Resolution(format!("service '{name}' is not configured")))?;

        if self.config.is_local() {
            let suffix = self.config.root_domain.trim().trim_end_matches('/');
            let host = if suffix.is_empty() || suffix.starts_with('.') {
                format!("{name}{suffix}")
            } else {
                format!("{name}.{suffix}")
            };
            let (scheme, authority) = scheme_and_authority(&host, self.config.server_port);
            return Ok((format!("{scheme}://{authority}/{rest}"), None));
        }

        match entry {
            DomainEntry::Plain(domain) => {
                let domain = domain.trim().trim_end_matches('/');
                if domain.starts_with("http://") || domain.starts_with("https://") {
                    Ok((format!("{domain}/{rest}"), None))
                } else {
                    let (scheme, _) = scheme_and_authority("", self.config.server_port);
                    Ok((format!("{scheme}://{domain}/{rest}"), None))
                }
            }
            DomainEntry::Endpoint { host, ip, port } => {
                let connect = if ip.is_empty() { host.as_str() } else { ip.as_str() };
                let (scheme, authority) = scheme_and_authority(connect, *port);
                let real_host = (connect != host.as_str()).then(|| host.clone());
                Ok((format!("{scheme}://{authority}/{rest}"), real_host))
            }
        }
    }

    fn resolve_external(&self, service_ref: &str) -> Result<ResolvedTarget, CallError> {
        let literal = service_ref.trim();
        let raw = if literal.contains("://") {
            literal.to_string()
        } else {
            format!("http://{literal}")
        };

        let mut url = Url::parse(&raw)
            .map_err(|e| CallError::Resolution(format!("invalid url '{raw}': {e}")))?;

        let host = url
            .host_str()
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| CallError::Resolution(format!("url '{raw}' has no host")))?;

        let substitution = self
            .config
            .intranet_address
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&host))
            .map(|(_, entry)| entry);

        if let Some(entry) = substitution {
            let invalid = |what: &str| {
                CallError::Resolution(format!("intranet {what} for '{host}' is invalid"))
            };
            let (scheme, _) = scheme_and_authority("", entry.port);
            url.set_scheme(scheme).map_err(|_| invalid("scheme"))?;
            url.set_host(Some(entry.address())).map_err(|_| invalid("address"))?;
            let port = match entry.port {
                0 | 80 | 443 => None,
                p => Some(p),
            };
            url.set_port(port).map_err(|_| invalid("port"))?;

            return Ok(ResolvedTarget { real_url: url, real_host: Some(host), needs_proxy: false });
        }

        let needs_proxy = self.proxy_policy.needs_proxy(true, &url);
        Ok(ResolvedTarget { real_url: url, real_host: None, needs_proxy })
    }
}

/// Port 443 selects https, 80 (or 0) plain http; any other port is kept
/// explicit in the authority.
fn scheme_and_authority(host: &str, port: u16) -> (&'static str, String) {
    match port {
        443 => ("https", host.to_string()),
        0 | 80 => ("http", host.to_string()),
        p => ("http", format!("{host}:{p}")),
    }
}

fn strip_scheme(root: &str) -> &str {
    root.split_once("://").map_or(root, |(_, rest)| rest)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::IntranetEntry;

    fn module_config() -> RpcConfig {
        RpcConfig {
            server_type: ServerType::Module,
            module: vec!["user".into(), "order".into()],
            root_domain: "api.example.com".into(),
            ..RpcConfig::default()
        }
    }

    fn domain_config() -> RpcConfig {
        let mut domain = HashMap::new();
        domain.insert("user".to_string(), DomainEntry::Plain("user.example.com".into()));
        domain.insert("billing".to_string(), DomainEntry::Plain("https://billing.example.com/".into()));
        domain.insert(
            "order".to_string(),
            DomainEntry::Endpoint { host: "order.example.com".into(), ip: "10.1.0.2".into(), port: 8081 },
        );
        domain.insert(
            "cart".to_string(),
            DomainEntry::Endpoint { host: "cart.example.com".into(), ip: String::new(), port: 443 },
        );

        let mut intranet = HashMap::new();
        intranet.insert(
            "pay.example.com".to_string(),
            IntranetEntry { host: String::new(), ip: "10.0.0.8".into(), port: 8080 },
        );

        RpcConfig { domain, intranet_address: intranet, ..RpcConfig::default() }
    }

    fn resolve(config: RpcConfig, service_ref: &str, external: bool) -> Result<ResolvedTarget, CallError> {
        Resolver::new(Arc::new(config)).resolve(service_ref, external, "req1")
    }

    #[test]
    fn test_module_mode() {
        let target = resolve(module_config(), "/user/info/get", false).unwrap();
        assert_eq!(target.real_url.as_str(), "http://api.example.com/user/info/get?wr_id=req1");
        assert!(!target.needs_proxy);
        assert_eq!(target.real_host, None);
    }

    #[test]
    fn test_module_underscore_prefix_and_https() {
        let config = RpcConfig { server_port: 443, ..module_config() };
        let target = resolve(config, "_order/list", false).unwrap();
        assert_eq!(target.real_url.as_str(), "https://api.example.com/order/list?wr_id=req1");
    }

    #[test]
    fn test_module_missing() {
        let err = resolve(module_config(), "/missing/x", false).unwrap_err();
        assert!(matches!(err, CallError::Resolution(_)));
    }

    #[test]
    fn test_domain_plain() {
        let target = resolve(domain_config(), "/user/info", false).unwrap();
        assert_eq!(target.real_url.as_str(), "http://user.example.com/info?wr_id=req1");

        let target = resolve(domain_config(), "/billing/invoice", false).unwrap();
        assert_eq!(target.real_url.as_str(), "https://billing.example.com/invoice?wr_id=req1");
    }

    #[test]
    fn test_domain_endpoint_sets_real_host() {
        let target = resolve(domain_config(), "/order/detail", false).unwrap();
        assert_eq!(target.real_url.as_str(), "http://10.1.0.2:8081/detail?wr_id=req1");
        assert_eq!(target.real_host.as_deref(), Some("order.example.com"));

        let target = resolve(domain_config(), "/cart/items", false).unwrap();
        assert_eq!(target.real_url.as_str(), "https://cart.example.com/items?wr_id=req1");
        assert_eq!(target.real_host, None);
    }

    #[test]
    fn test_domain_missing() {
        let err = resolve(domain_config(), "/nowhere/x", false).unwrap_err();
        assert!(matches!(err, CallError::Resolution(_)));
    }

    #[test]
    fn test_local_suffix_mode() {
        let mut domain = HashMap::new();
        domain.insert("user".to_string(), DomainEntry::Plain("user.example.com".into()));
        let config = RpcConfig {
            server: "local".into(),
            root_domain: "dev.example.com".into(),
            domain,
            ..RpcConfig::default()
        };
        let target = resolve(config.clone(), "/user/info", false).unwrap();
        assert_eq!(target.real_url.as_str(), "http://user.dev.example.com/info?wr_id=req1");

        let err = resolve(config, "/nosuchservice/x", false).unwrap_err();
        assert!(matches!(err, CallError::Resolution(_)));
    }

    #[test]
    fn test_external_literal() {
        let target = resolve(domain_config(), "http://www.example.org/api?q=1", true).unwrap();
        assert_eq!(target.real_url.as_str(), "http://www.example.org/api?q=1&wr_id=req1");
        assert!(target.needs_proxy);

        let target = resolve(domain_config(), "http://10.1.2.3/api", true).unwrap();
        assert!(!target.needs_proxy);
    }

    #[test]
    fn test_external_without_scheme() {
        let target = resolve(domain_config(), "www.example.org/api", true).unwrap();
        assert_eq!(target.real_url.as_str(), "http://www.example.org/api?wr_id=req1");
    }

    #[test]
    fn test_external_intranet_substitution() {
        let target = resolve(domain_config(), "https://pay.example.com/charge?x=1", true).unwrap();
        assert_eq!(target.real_url.as_str(), "http://10.0.0.8:8080/charge?x=1&wr_id=req1");
        assert_eq!(target.real_host.as_deref(), Some("pay.example.com"));
        assert!(!target.needs_proxy);
    }
}
