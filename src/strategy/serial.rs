//! Serial chains.
//!
//! Calls run strictly one after another. A call with a callback feeds the
//! callback's output into the next call's parameters; the context result is
//! the result of the last call without a callback (or of the last executed
//! call when every entry has one).

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::driver::Driver;
use crate::error::CallError;
use crate::request::{CallOptions, CallSpec};
use crate::strategy::{validate_entry, Strategy};

/// Progress of a serial chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialState {
    Idle,
    Validating,
    Executing(usize),
    Done,
    Failed,
}

/// Merge the previous callback output into the static parameters. Callback
/// fields win; non-object static parameters are replaced.
pub fn merge_params(static_params: Option<Value>, carried: Option<Map<String, Value>>) -> Option<Value> {
    let Some(carried) = carried else {
        return static_params;
    };
    match static_params {
        Some(Value::Object(mut params)) => {
            params.extend(carried);
            Some(Value::Object(params))
        }
        _ => Some(Value::Object(carried)),
    }
}

/// One run of a serial call set.
#[derive(Debug)]
pub struct SerialChain {
    calls: Vec<CallSpec>,
    state: SerialState,
}

impl SerialChain {
    pub fn new(calls: Vec<CallSpec>) -> Self {
        Self { calls, state: SerialState::Idle }
    }

    pub fn state(&self) -> SerialState {
        self.state
    }

    fn transition(&mut self, next: SerialState) {
        tracing::trace!(from = ?self.state, to = ?next, "Serial chain transition");
        self.state = next;
    }

    pub fn validate(&mut self) -> Result<(), CallError> {
        self.transition(SerialState::Validating);
        let outcome = validate_calls(&self.calls);
        if outcome.is_err() {
            self.transition(SerialState::Failed);
        }
        outcome
    }

    /// Execute the chain. `custom` applies to the first call only.
    pub async fn run(
        &mut self,
        driver: &mut dyn Driver,
        custom: Option<CallOptions>,
    ) -> Result<Value, CallError> {
        if self.state == SerialState::Idle {
            self.validate()?;
        }

        match self.execute(driver, custom).await {
            Ok(value) => {
                self.transition(SerialState::Done);
                Ok(value)
            }
            Err(err) => {
                self.transition(SerialState::Failed);
                Err(err)
            }
        }
    }

    async fn execute(
        &mut self,
        driver: &mut dyn Driver,
        mut custom: Option<CallOptions>,
    ) -> Result<Value, CallError> {
        let calls = std::mem::take(&mut self.calls);
        let mut carried: Option<Map<String, Value>> = None;
        let mut final_result: Option<Value> = None;
        let mut last_result = Value::Null;

        for (index, call) in calls.iter().enumerate() {
            self.transition(SerialState::Executing(index));

            let params = merge_params(call.params.clone(), carried.take());
            driver.set_params(call, custom.take().as_ref())?;
            let result = driver.call(&call.method, params).await?;

            match &call.callback {
                Some(callback) => match callback.call(&result) {
                    Value::Object(next) => carried = Some(next),
                    other => {
                        return Err(CallError::Validation(format!(
                            "callback of call #{index} must return an object, got {other}"
                        )));
                    }
                },
                None => final_result = Some(result.clone()),
            }
            last_result = result;
        }

        Ok(final_result.unwrap_or(last_result))
    }
}

fn validate_calls(calls: &[CallSpec]) -> Result<(), CallError> {
    if calls.is_empty() {
        return Err(CallError::Validation("call set is empty".into()));
    }
    for (index, call) in calls.iter().enumerate() {
        validate_entry(index, call)?;
    }
    Ok(())
}

/// Runs calls one after another.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialStrategy;

#[async_trait]
impl Strategy for SerialStrategy {
    fn is_parallel(&self) -> bool {
        false
    }

    fn validate(&self, calls: &[CallSpec]) -> Result<(), CallError> {
        validate_calls(calls)
    }

    async fn execute(
        &self,
        driver: &mut dyn Driver,
        calls: Vec<CallSpec>,
        custom: Option<CallOptions>,
    ) -> Result<Value, CallError> {
        SerialChain::new(calls).run(driver, custom).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::strategy::mock::MockDriver;

    #[test]
    fn test_merge_params() {
        let carried = json!({"id": 9, "x": 1}).as_object().cloned();
        assert_eq!(merge_params(Some(json!({"id": 1, "y": 2})), carried.clone()), Some(json!({"id": 9, "x": 1, "y": 2})));
        assert_eq!(merge_params(Some(json!("scalar")), carried.clone()), Some(json!({"id": 9, "x": 1})));
        assert_eq!(merge_params(None, carried), Some(json!({"id": 9, "x": 1})));
        assert_eq!(merge_params(Some(json!([1])), None), Some(json!([1])));
    }

    #[tokio::test]
    async fn test_chain_feeds_callback_output() {
        let mut driver = MockDriver::with_replies(vec![
            Ok(json!({"status": 1, "data": {"id": 7}})),
            Ok(json!({"status": 1, "data": {"name": "ann"}})),
        ]);
        let calls = vec![
            CallSpec::new("/user/lookup", "GET").callback(|r| json!({"uid": r["data"]["id"]})),
            CallSpec::new("/user/profile", "GET").params(json!({"uid": 0, "full": true})),
        ];

        let mut chain = SerialChain::new(calls);
        let result = chain.run(&mut driver, None).await.unwrap();

        assert_eq!(result, json!({"status": 1, "data": {"name": "ann"}}));
        assert_eq!(chain.state(), SerialState::Done);
        assert_eq!(driver.sent[1].params, Some(json!({"uid": 7, "full": true})));
    }

    #[tokio::test]
    async fn test_result_of_last_call_without_callback() {
        let mut driver = MockDriver::with_replies(vec![
            Ok(json!({"step": 1})),
            Ok(json!({"step": 2})),
        ]);
        let calls = vec![
            CallSpec::new("/a/x", "GET"),
            CallSpec::new("/a/y", "GET").callback(|_| json!({})),
        ];
        let result = SerialStrategy.execute(&mut driver, calls, None).await.unwrap();
        assert_eq!(result, json!({"step": 1}));
    }

    #[tokio::test]
    async fn test_all_callbacks_returns_last_result() {
        let mut driver = MockDriver::with_replies(vec![Ok(json!({"step": 1})), Ok(json!({"step": 2}))]);
        let calls = vec![
            CallSpec::new("/a/x", "GET").callback(|_| json!({})),
            CallSpec::new("/a/y", "GET").callback(|_| json!({})),
        ];
        let result = SerialStrategy.execute(&mut driver, calls, None).await.unwrap();
        assert_eq!(result, json!({"step": 2}));
    }

    #[tokio::test]
    async fn test_callback_must_return_object() {
        let mut driver = MockDriver::default();
        let calls = vec![
            CallSpec::new("/a/x", "GET").callback(|_| json!(42)),
            CallSpec::new("/a/y", "GET"),
        ];
        let mut chain = SerialChain::new(calls);
        let err = chain.run(&mut driver, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(chain.state(), SerialState::Failed);
        assert_eq!(driver.sent.len(), 1);
    }

    #[tokio::test]
    async fn test_error_aborts_chain() {
        let mut driver = MockDriver::with_replies(vec![Err(CallError::Protocol { code: 500, message: "service internal error".into() })]);
        let calls = vec![CallSpec::new("/a/x", "GET"), CallSpec::new("/a/y", "GET")];
        let err = SerialStrategy.execute(&mut driver, calls, None).await.unwrap_err();
        assert_eq!(err.code(), 500);
        assert_eq!(driver.sent.len(), 1);
    }

    #[tokio::test]
    async fn test_resolution_error_raises() {
        let mut driver = MockDriver::default();
        let calls = vec![CallSpec::new("/a/x", "GET"), CallSpec::new("/missing/y", "GET")];
        let err = SerialStrategy.execute(&mut driver, calls, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
    }

    #[tokio::test]
    async fn test_custom_options_apply_to_first_call_only() {
        let mut driver = MockDriver::default();
        let calls = vec![CallSpec::new("/a/x", "GET"), CallSpec::new("/a/y", "GET")];
        let custom = CallOptions::default().timeout_ms(9000);
        SerialStrategy.execute(&mut driver, calls, Some(custom.clone())).await.unwrap();
        assert_eq!(driver.sent[0].overrides, Some(custom));
        assert_eq!(driver.sent[1].overrides, None);
    }

    #[test]
    fn test_validation() {
        let strategy = SerialStrategy;
        assert!(strategy.validate(&[]).is_err());
        assert!(strategy.validate(&[CallSpec::new("", "GET")]).is_err());
        assert!(strategy.validate(&[CallSpec::new("/a/b", "")]).is_err());
        assert!(strategy.validate(&[CallSpec::new("http://x.example.com/a", "GET")]).is_err());
        assert!(strategy.validate(&[CallSpec::new("http://x.example.com/a", "GET").external()]).is_ok());
        assert!(strategy.validate(&[CallSpec::new("/a/b", "GET")]).is_ok());
    }
}
