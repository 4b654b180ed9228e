//! Forward proxy decision.
//!
//! # Responsibilities
//! - Decide whether an outgoing call must go through the forward proxy
//! - Recognise intranet-registered hosts and private IPv4 literals
//!
//! # Design Decisions
//! - Internal calls never use the proxy
//! - The 172.0.0.0/8 range is matched as a whole /8, wider than RFC 1918
//! - Non-literal host names need the proxy unless registered

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use url::{Host, Url};

use crate::config::IntranetEntry;

/// Returns true for IPv4 literals that are reachable without the proxy.
pub fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    matches!(ip.octets()[0], 10 | 127 | 172 | 192)
}

/// Proxy decision table built from the intranet substitutions.
#[derive(Debug, Clone, Default)]
pub struct ProxyPolicy {
    intranet_hosts: HashSet<String>,
}

impl ProxyPolicy {
    /// Build the policy. Substitution keys, entry hosts and entry IPs all
    /// count as intranet hosts.
    pub fn new(intranet: &HashMap<String, IntranetEntry>) -> Self {
        let mut intranet_hosts = HashSet::new();
        for (name, entry) in intranet {
            for host in [name.as_str(), entry.host.as_str(), entry.ip.as_str()] {
                if !host.is_empty() {
                    intranet_hosts.insert(host.to_ascii_lowercase());
                }
            }
        }
        Self { intranet_hosts }
    }

    /// Whether `host` is explicitly registered as an intranet host.
    pub fn is_intranet(&self, host: &str) -> bool {
        self.intranet_hosts.contains(&host.to_ascii_lowercase())
    }

    /// Whether a call to `url` must be routed through the forward proxy.
    pub fn needs_proxy(&self, is_external: bool, url: &Url) -> bool {
        if !is_external {
            return false;
        }
        match url.host() {
            Some(Host::Ipv4(ip)) => !(is_private_ipv4(ip) || self.is_intranet(&ip.to_string())),
            Some(Host::Ipv6(ip)) => !self.is_intranet(&ip.to_string()),
            Some(Host::Domain(domain)) => !self.is_intranet(domain),
            None => true,
        }
    }
}
