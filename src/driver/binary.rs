//! Binary RPC driver.
//!
//! Header fields travel as transport metadata (`Key: value` lines) and each
//! request carries its own timeouts, so no transport state is shared between
//! calls.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::driver::{CallEnv, CallTrace, Driver, DriverCore, PreparedCall, Settings, Started};
use crate::error::CallError;
use crate::observability::LogRecord;
use crate::request::{CallOptions, CallSpec};
use crate::response::RawOutcome;
use crate::transport::{RpcRequest, RpcTransport};

pub const TRANSPORT_NAME: &str = "binary-rpc";

async fn execute(transport: Arc<dyn RpcTransport>, request: RpcRequest) -> RawOutcome {
    match transport.invoke(request).await {
        Ok(payload) => RawOutcome::Rpc { status: 0, payload },
        Err(failure) => RawOutcome::Rpc { status: failure.status, payload: failure.message },
    }
}

fn rpc_request(call: &PreparedCall) -> RpcRequest {
    RpcRequest {
        url: call.target.real_url.clone(),
        method: call.method.clone(),
        params: call.params.clone().unwrap_or(Value::Null),
        metadata: call.headers.lines(),
        connect_timeout: call.timeouts.connect,
        timeout: call.timeouts.total,
        proxy: call.proxy.clone(),
        persistent: true,
    }
}

pub struct BinaryRpcDriver {
    core: DriverCore,
    transport: Arc<dyn RpcTransport>,
}

impl BinaryRpcDriver {
    pub fn new(settings: Arc<Settings>, env: CallEnv, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            core: DriverCore::new(settings, env, TRANSPORT_NAME),
            transport,
        }
    }
}

#[async_trait]
impl Driver for BinaryRpcDriver {
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

        tracing::debug!(
            request_id = %self.core.env().request_id,
            url = %call.target.real_url,
            method = %call.method,
            "Invoking remote method"
        );

        let started = Started::now();
        let outcome = execute(Arc::clone(&self.transport), rpc_request(&call)).await;
        let result = self.core.settle(&call.trace(), started, &outcome);
        self.core.finish_single(result)
    }

    fn set_multi_params(&mut self, calls: &[CallSpec], overrides: Option<&CallOptions>) {
        self.core.begin_fan_out(calls.len());

        for spec in calls {
            let started = Started::now();
            match self.core.prepare(spec, overrides) {
                Ok(call) => {
                    let handle = tokio::spawn(execute(Arc::clone(&self.transport), rpc_request(&call)));
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
