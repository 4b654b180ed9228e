//! HTTP/JSON driver.
//!
//! # Responsibilities
//! - Turn a prepared call into a reqwest request
//! - Put GET data into the query string and other data into a JSON body
//! - Sign the final URL when signing is enabled
//!
//! # Design Decisions
//! - Non-2xx statuses are outcomes, not transport errors
//! - One reqwest client per (connect timeout, proxy), reused for the
//!   lifetime of the driver

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::driver::{CallEnv, CallTrace, Driver, DriverCore, PreparedCall, Settings, Started};
use crate::error::CallError;
use crate::observability::LogRecord;
use crate::request::{CallOptions, CallSpec};
use crate::response::{codes, with_key, RawOutcome};
use crate::transport::{error_chain, transfer_code, ClientCache};

pub const TRANSPORT_NAME: &str = "http";

/// Send one request and capture whatever came back.
async fn execute(request: reqwest::RequestBuilder) -> RawOutcome {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            return RawOutcome::Transfer { code: transfer_code(&e), message: error_chain(&e) };
        }
    };

    let status = response.status().as_u16();
    match response.text().await {
        Ok(body) => RawOutcome::Http { status, body },
        Err(e) => RawOutcome::Transfer { code: transfer_code(&e), message: error_chain(&e) },
    }
}

/// Query-string text for one GET parameter value.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Query pairs for GET data. Objects map by field name, arrays by index.
fn query_pairs(params: Option<&Value>) -> Result<Vec<(String, String)>, String> {
    match params {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => Ok(map.iter().map(|(k, v)| (k.clone(), query_value(v))).collect()),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), query_value(v)))
            .collect()),
        Some(other) => Err(format!("GET data must be an object or array, got {other}")),
    }
}

pub struct HttpDriver {
    core: DriverCore,
    clients: ClientCache,
}

impl HttpDriver {
    pub fn new(settings: Arc<Settings>, env: CallEnv) -> Self {
        Self {
            core: DriverCore::new(settings, env, TRANSPORT_NAME),
            clients: ClientCache::new(),
        }
    }

    /// Build the reqwest request. Rewrites `call.target.real_url` with GET
    /// data and a fresh signature so the log record shows what was sent.
    fn request_for(&self, call: &mut PreparedCall) -> Result<reqwest::RequestBuilder, CallError> {
        let method = Method::from_bytes(call.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| CallError::Validation(format!("invalid http method '{}'", call.method)))?;

        if method == Method::GET {
            let pairs = query_pairs(call.params.as_ref())
                .map_err(|message| CallError::Validation(with_key(&call.key, &message)))?;
            if !pairs.is_empty() {
                call.target.real_url.query_pairs_mut().extend_pairs(pairs);
                // GET data changed the query; the signature from prepare is stale.
                self.core.signer().apply(&mut call.target.real_url);
            }
        }

        let client = self
            .clients
            .get(call.timeouts.connect, call.proxy.as_deref())
            .map_err(|e| {
                let code = transfer_code(&e);
                CallError::Transport { code, message: with_key(&call.key, codes::transfer_message(code)) }
            })?;

        let mut request = client
            .request(method.clone(), call.target.real_url.clone())
            .timeout(call.timeouts.total);
        for (name, value) in call.headers.iter() {
            request = request.header(name, value);
        }
        if method != Method::GET {
            if let Some(data) = &call.params {
                request = request.json(data);
            }
        }

        Ok(request)
    }
}

#[async_trait]
impl Driver for HttpDriver {
    fn transport(&self) -> &'static str {
        TRANSPORT_NAME
    }

    fn set_params(&mut self, call: &CallSpec, overrides: Option<&CallOptions>) -> Result<(), CallError> {
        let prepared = self.core.prepare(call, overrides)?;
        self.core.set_pending(prepared);
        Ok(())
    }

    async fn call(&mut self, method: &str, data: Option<Value>) -> Result<Value, CallError> {
        let mut call = self.core.take_pending()?;
        call.method = method.to_string();
        call.params = data;

        let started = Started::now();
        let request = match self.request_for(&mut call) {
            Ok(request) => request,
            Err(err) => {
                self.core.fail(&call.trace(), started, &err, "");
                return Err(err);
            }
        };

        tracing::debug!(
            request_id = %self.core.env().request_id,
            url = %call.target.real_url,
            method = %call.method,
            proxy = call.proxy.is_some(),
            "Sending request"
        );

        let outcome = execute(request).await;
        let result = self.core.settle(&call.trace(), started, &outcome);
        self.core.finish_single(result)
    }

    fn set_multi_params(&mut self, calls: &[CallSpec], overrides: Option<&CallOptions>) {
        self.core.begin_fan_out(calls.len());

        for spec in calls {
            let started = Started::now();
            let prepared = self.core.prepare(spec, overrides).and_then(|mut call| {
                let request = self.request_for(&mut call)?;
                Ok((call, request))
            });

            match prepared {
                Ok((call, request)) => {
                    let handle = tokio::spawn(execute(request));
                    self.core.push_running(call.trace(), started, call.timeouts.total, handle);
                }
                Err(err) => self.core.push_failed(CallTrace::unresolved(spec), started, err),
            }
        }
    }

    async fn multi_call(&mut self) -> Value {
        self.core.collect().await
    }

    fn take_records(&mut self) -> Vec<LogRecord> {
        self.core.take_records()
    }
}
