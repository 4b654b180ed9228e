//! Call descriptions and caller credentials.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::request::options::CallOptions;

/// Transforms a call's result into the parameters of the next call.
///
/// The returned value must be a JSON object.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(&Value) -> Value + Send + Sync>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, result: &Value) -> Value {
        (self.0)(result)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// One remote call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallSpec {
    /// Internal service reference (`/user/info/get`) or external URL.
    #[serde(alias = "url")]
    pub service_ref: String,

    /// HTTP verb for the HTTP driver, remote method name for binary RPC.
    #[serde(default)]
    pub method: String,

    #[serde(default)]
    pub params: Option<Value>,

    /// Bypass the routing table.
    #[serde(default, alias = "outer")]
    pub is_external: bool,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub options: CallOptions,

    /// Result slot name in parallel mode.
    #[serde(default)]
    pub key: Option<String>,

    #[serde(skip)]
    pub callback: Option<Callback>,
}

impl CallSpec {
    pub fn new(service_ref: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service_ref: service_ref.into(),
            method: method.into(),
            ..Self::default()
        }
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn external(mut self) -> Self {
        self.is_external = true;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.callback = Some(Callback::new(f));
        self
    }

    /// Key used for logging and error prefixes; empty when unset.
    pub fn key_str(&self) -> &str {
        self.key.as_deref().unwrap_or("")
    }
}

/// Caller identity forwarded with every call.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Token {
    #[default]
    None,
    Raw(String),
    Structured(Value),
}

impl Token {
    /// Value of the token header: empty, the raw string, or JSON text.
    pub fn header_value(&self) -> String {
        match self {
            Token::None => String::new(),
            Token::Raw(raw) => raw.clone(),
            Token::Structured(value) => value.to_string(),
        }
    }
}

impl From<&str> for Token {
    fn from(raw: &str) -> Self {
        Token::Raw(raw.to_string())
    }
}

impl From<String> for Token {
    fn from(raw: String) -> Self {
        Token::Raw(raw)
    }
}

impl From<Value> for Token {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Token::None,
            Value::String(raw) => Token::Raw(raw),
            other => Token::Structured(other),
        }
    }
}
