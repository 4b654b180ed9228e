//! Request context: one top-level invocation.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use crate::driver::{CallEnv, DriverKind, Settings};
use crate::error::{CallError, RpcError};
use crate::observability::flush;
use crate::request::{CallOptions, CallSpec, ClientOrigin, Token};
use crate::strategy::{self, Strategy};

/// Correlation id sent as `wr_id` with every call of a context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered (serial) or keyed (parallel) call set plus caller identity.
///
/// A context is single-use: `get()` consumes the call set and any custom
/// options, and a second `get()` fails with a validation error.
pub struct RequestContext {
    settings: Arc<Settings>,
    driver: DriverKind,
    strategy: Box<dyn Strategy>,
    calls: Vec<CallSpec>,
    token: Token,
    origin: Option<ClientOrigin>,
    request_id: RequestId,
    custom_options: Option<CallOptions>,
    used: bool,
}

impl RequestContext {
    pub(crate) fn new(
        settings: Arc<Settings>,
        driver: DriverKind,
        calls: Vec<CallSpec>,
        token: Token,
        parallel: bool,
    ) -> Self {
        Self {
            settings,
            driver,
            strategy: strategy::for_mode(parallel),
            calls,
            token,
            origin: None,
            request_id: RequestId::generate(),
            custom_options: None,
            used: false,
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn is_parallel(&self) -> bool {
        self.strategy.is_parallel()
    }

    /// Attach the inbound request this context serves. Marks the caller as
    /// interactive and feeds `x-real-ip`.
    pub fn with_origin(mut self, origin: ClientOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Options for the next `get()` only: the first call in serial mode,
    /// every call in parallel mode.
    pub fn set_custom_options(&mut self, options: CallOptions) -> &mut Self {
        self.custom_options = Some(options);
        self
    }

    /// Run the call set.
    pub async fn get(&mut self) -> Result<Value, RpcError> {
        if self.used {
            return Err(CallError::Validation("request context has already been used".into()).into());
        }
        self.used = true;

        let calls = std::mem::take(&mut self.calls);
        let custom = self.custom_options.take();
        let env = CallEnv {
            request_id: self.request_id.clone(),
            token: self.token.clone(),
            origin: self.origin.clone(),
        };

        let mut driver = self.driver.build(Arc::clone(&self.settings), env);
        let span = tracing::info_span!(
            "rpc_request",
            request_id = %self.request_id,
            transport = driver.transport(),
            calls = calls.len(),
            parallel = self.strategy.is_parallel()
        );

        let result = match self.strategy.validate(&calls) {
            Ok(()) => {
                self.strategy
                    .execute(driver.as_mut(), calls, custom)
                    .instrument(span)
                    .await
            }
            Err(err) => Err(err),
        };

        flush(
            self.settings.log_sink.as_deref(),
            &self.settings.config.logs,
            driver.take_records(),
        );

        if let Err(err) = &result {
            tracing::warn!(
                request_id = %self.request_id,
                kind = %err.kind(),
                code = err.code(),
                error = %err,
                "Request failed"
            );
        }

        result.map_err(RpcError::from)
    }

    /// Drop the call set and pending options without running them.
    pub fn close(&mut self) {
        self.calls.clear();
        self.custom_options = None;
        self.used = true;
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("driver", &self.driver)
            .field("calls", &self.calls.len())
            .field("parallel", &self.strategy.is_parallel())
            .field("used", &self.used)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_is_32_hex() {
        let id = RequestId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, RequestId::generate());
    }
}
