//! Transport drivers.
//!
//! # Data Flow
//! ```text
//! Strategy
//!     → Driver::set_params(call)        single: resolve, headers, timeouts, proxy
//!     → Driver::call(method, data)      one request, normalised, logged
//!
//!     → Driver::set_multi_params(calls) fan-out: prepare + spawn every call
//!     → Driver::multi_call()            fan-in: await handles in order until
//!                                        the global deadline, settle each key
//! ```
//!
//! # Design Decisions
//! - `DriverCore` owns everything transport independent: preparation,
//!   settling, degrading, log records and the fan-in
//! - Each parallel call is its own tokio task; a failure never touches a
//!   sibling's slot
//! - Fan-in never raises; failures are degraded into their key's slot

pub mod binary;
pub mod headers;
pub mod http;
pub mod timeouts;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use crate::config::RpcConfig;
use crate::error::CallError;
use crate::observability::{classify, metrics, LogRecord, LogSink};
use crate::request::{CallOptions, CallSpec, CallerKind, ClientOrigin, ProxyOverride, RequestId, Token};
use crate::response::codes::{self, transfer};
use crate::response::{degraded, normalize, with_key, RawOutcome, ResultMap};
use crate::routing::{ResolvedTarget, Resolver, Signer};
use crate::transport::RpcTransport;

pub use binary::BinaryRpcDriver;
pub use headers::{build_headers, HeaderSet};
pub use http::HttpDriver;
pub use timeouts::EffectiveTimeouts;

/// Slack added to the longest per-call timeout before fan-in gives up.
const FANIN_GRACE: Duration = Duration::from_millis(250);

/// Read-only state shared by every context of one client.
#[derive(Clone)]
pub struct Settings {
    pub config: Arc<RpcConfig>,
    pub resolver: Resolver,
    pub signer: Signer,
    pub log_sink: Option<Arc<dyn LogSink>>,
}

impl Settings {
    pub fn new(config: RpcConfig, log_sink: Option<Arc<dyn LogSink>>) -> Self {
        let signer = Signer::from_config(&config.sign);
        let config = Arc::new(config);
        Self {
            resolver: Resolver::new(Arc::clone(&config)),
            config,
            signer,
            log_sink,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("config", &self.config)
            .field("signer", &self.signer)
            .field("log_sink", &self.log_sink.is_some())
            .finish()
    }
}

/// Per-context caller information.
#[derive(Debug, Clone)]
pub struct CallEnv {
    pub request_id: RequestId,
    pub token: Token,
    pub origin: Option<ClientOrigin>,
}

impl CallEnv {
    pub fn caller_kind(&self) -> CallerKind {
        if self.origin.is_some() {
            CallerKind::Interactive
        } else {
            CallerKind::NonInteractive
        }
    }

    pub fn client_ip(&self) -> String {
        self.origin.clone().unwrap_or_default().client_ip()
    }
}

/// One call after resolution, ready to be sent.
#[derive(Debug, Clone)]
pub struct PreparedCall {
    pub key: String,
    pub method: String,
    pub params: Option<Value>,
    pub target: ResolvedTarget,
    pub headers: HeaderSet,
    pub timeouts: EffectiveTimeouts,
    /// Forward proxy URL, when this call goes through one.
    pub proxy: Option<String>,
}

impl PreparedCall {
    pub fn trace(&self) -> CallTrace {
        CallTrace {
            key: self.key.clone(),
            url: self.target.real_url.to_string(),
            method: self.method.clone(),
            headers: self.headers.lines(),
            params: self.params.clone().unwrap_or(Value::Null),
        }
    }
}

/// What a log record needs to know about the request side of a call.
#[derive(Debug, Clone)]
pub struct CallTrace {
    pub key: String,
    pub url: String,
    pub method: String,
    pub headers: Vec<String>,
    pub params: Value,
}

impl CallTrace {
    /// Trace for a call that failed before it had a URL.
    pub fn unresolved(call: &CallSpec) -> Self {
        Self {
            key: call.key_str().to_string(),
            url: call.service_ref.clone(),
            method: call.method.clone(),
            headers: Vec::new(),
            params: call.params.clone().unwrap_or(Value::Null),
        }
    }
}

/// Dispatch timestamps of one call.
#[derive(Debug, Clone, Copy)]
pub struct Started {
    pub at: Instant,
    pub unix: f64,
}

impl Started {
    pub fn now() -> Self {
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Self { at: Instant::now(), unix }
    }
}

enum Dispatch {
    Running(JoinHandle<RawOutcome>),
    Failed(CallError),
}

struct InFlight {
    trace: CallTrace,
    started: Started,
    timeout: Duration,
    dispatch: Dispatch,
}

/// Executes calls against one transport.
#[async_trait]
pub trait Driver: Send {
    /// Short transport name used in logs and metrics.
    fn transport(&self) -> &'static str;

    /// Prepare a single call. Resolution failures are returned, never
    /// degraded.
    fn set_params(&mut self, call: &CallSpec, overrides: Option<&CallOptions>) -> Result<(), CallError>;

    /// Execute the prepared call.
    async fn call(&mut self, method: &str, data: Option<Value>) -> Result<Value, CallError>;

    /// Prepare and dispatch every call without waiting for any of them.
    fn set_multi_params(&mut self, calls: &[CallSpec], overrides: Option<&CallOptions>);

    /// Await every dispatched call and assemble the keyed result.
    async fn multi_call(&mut self) -> Value;

    /// Drain the log records of the calls executed so far.
    fn take_records(&mut self) -> Vec<LogRecord>;
}

/// Which driver a context builds.
#[derive(Clone)]
pub enum DriverKind {
    Http,
    BinaryRpc(Arc<dyn RpcTransport>),
}

impl DriverKind {
    pub fn build(&self, settings: Arc<Settings>, env: CallEnv) -> Box<dyn Driver> {
        match self {
            DriverKind::Http => Box::new(HttpDriver::new(settings, env)),
            DriverKind::BinaryRpc(transport) => {
                Box::new(BinaryRpcDriver::new(settings, env, Arc::clone(transport)))
            }
        }
    }
}

impl fmt::Debug for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::Http => f.write_str("Http"),
            DriverKind::BinaryRpc(_) => f.write_str("BinaryRpc"),
        }
    }
}

/// Transport-independent half of a driver.
pub struct DriverCore {
    settings: Arc<Settings>,
    env: CallEnv,
    transport: &'static str,
    pending: Option<PreparedCall>,
    in_flight: Vec<InFlight>,
    fan_started: Option<Instant>,
    records: Vec<LogRecord>,
}

impl DriverCore {
    pub fn new(settings: Arc<Settings>, env: CallEnv, transport: &'static str) -> Self {
        Self {
            settings,
            env,
            transport,
            pending: None,
            in_flight: Vec::new(),
            fan_started: None,
            records: Vec::new(),
        }
    }

    pub fn config(&self) -> &RpcConfig {
        &self.settings.config
    }

    pub fn signer(&self) -> &Signer {
        &self.settings.signer
    }

    pub fn env(&self) -> &CallEnv {
        &self.env
    }

    /// Resolve and assemble one call.
    pub fn prepare(&self, call: &CallSpec, overrides: Option<&CallOptions>) -> Result<PreparedCall, CallError> {
        let options = match overrides {
            Some(custom) => call.options.layered(custom),
            None => call.options.clone(),
        };

        let mut target = self.settings.resolver.resolve(
            &call.service_ref,
            call.is_external,
            self.env.request_id.as_str(),
        )?;
        self.settings.signer.apply(&mut target.real_url);

        let config = self.config();
        let headers = build_headers(
            &config.token_key,
            &self.env.token,
            self.env.caller_kind(),
            &self.env.client_ip(),
            call.headers.iter().chain(options.headers.iter()),
            target.real_host.as_deref(),
        );

        let use_proxy = match options.proxy {
            ProxyOverride::Always => true,
            ProxyOverride::Never => false,
            ProxyOverride::Auto => target.needs_proxy,
        };
        let proxy = config.proxy.as_ref().filter(|_| use_proxy).map(|p| p.url());

        Ok(PreparedCall {
            key: call.key_str().to_string(),
            method: call.method.clone(),
            params: call.params.clone(),
            timeouts: EffectiveTimeouts::compose(config, &options),
            target,
            headers,
            proxy,
        })
    }

    pub fn set_pending(&mut self, call: PreparedCall) {
        self.pending = Some(call);
    }

    /// Take the call stored by `set_params`.
    pub fn take_pending(&mut self) -> Result<PreparedCall, CallError> {
        self.pending
            .take()
            .ok_or_else(|| CallError::Validation("no call prepared; set_params must run first".into()))
    }

    pub fn begin_fan_out(&mut self, size: usize) {
        self.in_flight.clear();
        self.fan_started = Some(Instant::now());
        metrics::record_fanout(self.transport, size);
    }

    pub fn push_running(
        &mut self,
        trace: CallTrace,
        started: Started,
        timeout: Duration,
        handle: JoinHandle<RawOutcome>,
    ) {
        tracing::debug!(
            request_id = %self.env.request_id,
            key = %trace.key,
            url = %trace.url,
            transport = self.transport,
            "Dispatched call"
        );
        self.in_flight.push(InFlight { trace, started, timeout, dispatch: Dispatch::Running(handle) });
    }

    pub fn push_failed(&mut self, trace: CallTrace, started: Started, err: CallError) {
        self.in_flight.push(InFlight {
            trace,
            started,
            timeout: Duration::ZERO,
            dispatch: Dispatch::Failed(err),
        });
    }

    /// Normalise one outcome and record it.
    pub fn settle(&mut self, trace: &CallTrace, started: Started, outcome: &RawOutcome) -> Result<ResultMap, CallError> {
        match normalize(outcome, &trace.key) {
            Ok(map) => {
                self.record(trace, started, &Value::Object(map.clone()), false, outcome.raw_text());
                metrics::record_call(self.transport, None, started.at);
                Ok(map)
            }
            Err(err) => {
                self.fail(trace, started, &err, outcome.raw_text());
                Err(err)
            }
        }
    }

    /// Record a failed call.
    pub fn fail(&mut self, trace: &CallTrace, started: Started, err: &CallError, origin_response: &str) {
        tracing::warn!(
            request_id = %self.env.request_id,
            key = %trace.key,
            url = %trace.url,
            status = err.code(),
            error = %err,
            "Call failed"
        );
        self.record(trace, started, &Value::String(err.message()), true, origin_response);
        metrics::record_call(self.transport, Some(err.kind()), started.at);
    }

    /// Outcome of a single call: raise when `display_error`, else degrade.
    pub fn finish_single(&self, result: Result<ResultMap, CallError>) -> Result<Value, CallError> {
        match result {
            Ok(map) => Ok(Value::Object(map)),
            Err(err) if self.config().error.display_error => Err(err),
            Err(err) => Ok(self.degrade(&err)),
        }
    }

    pub fn degrade(&self, err: &CallError) -> Value {
        degraded(&self.config().error, err.message())
    }

    /// Await every in-flight call and build `{status, msg, data}`.
    pub async fn collect(&mut self) -> Value {
        let in_flight = std::mem::take(&mut self.in_flight);
        let fan_started = self.fan_started.take().unwrap_or_else(Instant::now);
        let latest = in_flight
            .iter()
            .filter(|f| matches!(f.dispatch, Dispatch::Running(_)))
            .map(|f| f.started.at + f.timeout)
            .max()
            .unwrap_or(fan_started);
        let deadline = tokio::time::Instant::from_std(latest + FANIN_GRACE);

        let mut data = Map::new();
        for InFlight { trace, started, dispatch, .. } in in_flight {
            let slot = match dispatch {
                Dispatch::Failed(err) => {
                    self.fail(&trace, started, &err, "");
                    self.degrade(&err)
                }
                Dispatch::Running(mut handle) => {
                    match tokio::time::timeout_at(deadline, &mut handle).await {
                        Ok(Ok(outcome)) => match self.settle(&trace, started, &outcome) {
                            Ok(map) => Value::Object(map),
                            Err(err) => self.degrade(&err),
                        },
                        Ok(Err(join_err)) => {
                            let err = self.global_failure(&trace.key, fan_started);
                            self.fail(&trace, started, &err, &join_err.to_string());
                            self.degrade(&err)
                        }
                        Err(_) => {
                            handle.abort();
                            let err = self.global_failure(&trace.key, fan_started);
                            self.fail(&trace, started, &err, "fan-in deadline exceeded");
                            self.degrade(&err)
                        }
                    }
                }
            };
            data.insert(trace.key, slot);
        }

        let error = &self.config().error;
        let mut envelope = Map::new();
        envelope.insert(error.code_key.clone(), Value::from(error.success_value()));
        envelope.insert(error.msg_key.clone(), Value::String("success".into()));
        envelope.insert("data".into(), Value::Object(data));
        Value::Object(envelope)
    }

    pub fn take_records(&mut self) -> Vec<LogRecord> {
        std::mem::take(&mut self.records)
    }

    /// Error for a key the fan-in could not settle on its own.
    fn global_failure(&self, key: &str, fan_started: Instant) -> CallError {
        let configured = Duration::from_millis(self.config().timeout);
        if fan_started.elapsed() >= configured {
            CallError::Transport {
                code: transfer::OPERATION_TIMEDOUT,
                message: with_key(key, codes::SERVICE_TIMED_OUT),
            }
        } else {
            CallError::Transport {
                code: transfer::COULDNT_CONNECT,
                message: with_key(key, codes::SERVICE_CONNECT_FAILED),
            }
        }
    }

    fn record(&mut self, trace: &CallTrace, started: Started, result: &Value, failed: bool, origin_response: &str) {
        let level = classify(result, failed, &self.config().error);
        self.records.push(LogRecord {
            request_id: self.env.request_id.to_string(),
            key: trace.key.clone(),
            url: trace.url.clone(),
            method: trace.method.clone(),
            headers: trace.headers.clone(),
            params: trace.params.clone(),
            request_time: started.unix,
            use_time: started.at.elapsed().as_secs_f64(),
            result: result.clone(),
            origin_response: origin_response.to_string(),
            level,
        });
    }
}
