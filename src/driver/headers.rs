//! Outgoing header assembly.

use crate::request::{CallerKind, Token};

pub const ENV_HEADER: &str = "env";
pub const REAL_IP_HEADER: &str = "x-real-ip";
pub const HOST_HEADER: &str = "host";

/// Ordered header list with case-insensitive replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet(Vec<(String, String)>);

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing any existing value regardless of case.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Key: value` lines, as the binary transport and log records expect.
    pub fn lines(&self) -> Vec<String> {
        self.0.iter().map(|(n, v)| format!("{n}: {v}")).collect()
    }
}

/// Headers sent with every call.
///
/// Caller-supplied headers may override the built-in ones except the host
/// override, which always reflects the substituted target.
pub fn build_headers<'a>(
    token_key: &str,
    token: &Token,
    caller: CallerKind,
    client_ip: &str,
    extra: impl IntoIterator<Item = (&'a String, &'a String)>,
    real_host: Option<&str>,
) -> HeaderSet {
    let mut headers = HeaderSet::new();
    headers.insert(token_key, token.header_value());
    headers.insert(ENV_HEADER, caller.env_marker());
    headers.insert(REAL_IP_HEADER, client_ip);

    for (name, value) in extra {
        headers.insert(name.as_str(), value.as_str());
    }

    if let Some(host) = real_host {
        headers.insert(HOST_HEADER, host);
    }

    headers
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_build_headers() {
        let mut extra = BTreeMap::new();
        extra.insert("X-Trace".to_string(), "t1".to_string());
        extra.insert("Host".to_string(), "ignored.example.com".to_string());

        let headers = build_headers(
            "auth",
            &Token::Structured(json!({"uid": 1})),
            CallerKind::NonInteractive,
            "10.0.0.1",
            &extra,
            Some("order.example.com"),
        );

        assert_eq!(headers.get("auth"), Some(r#"{"uid":1}"#));
        assert_eq!(headers.get("env"), Some("shell"));
        assert_eq!(headers.get("X-REAL-IP"), Some("10.0.0.1"));
        assert_eq!(headers.get("x-trace"), Some("t1"));
        assert_eq!(headers.get("host"), Some("order.example.com"));
        assert_eq!(headers.len(), 5);
    }

    #[test]
    fn test_lines() {
        let mut headers = HeaderSet::new();
        headers.insert("token", "");
        headers.insert("env", "browser");
        headers.insert("ENV", "shell");
        assert_eq!(headers.lines(), vec!["token: ".to_string(), "env: shell".to_string()]);
    }
}
