//! Parallel fan-out.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;

use crate::driver::Driver;
use crate::error::CallError;
use crate::request::{CallOptions, CallSpec};
use crate::strategy::{validate_entry, Strategy};

/// Issues every call at once and collects results by key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelStrategy;

#[async_trait]
impl Strategy for ParallelStrategy {
    fn is_parallel(&self) -> bool {
        true
    }

    fn validate(&self, calls: &[CallSpec]) -> Result<(), CallError> {
        if calls.is_empty() {
            return Err(CallError::Validation("call set is empty".into()));
        }

        let mut seen = HashSet::with_capacity(calls.len());
        for (index, call) in calls.iter().enumerate() {
            validate_entry(index, call)?;

            let key = call.key_str();
            if key.is_empty() {
                return Err(CallError::Validation(format!("call #{index} has no key")));
            }
            if !seen.insert(key) {
                return Err(CallError::Validation(format!("duplicate key '{key}'")));
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        driver: &mut dyn Driver,
        calls: Vec<CallSpec>,
        custom: Option<CallOptions>,
    ) -> Result<Value, CallError> {
        driver.set_multi_params(&calls, custom.as_ref());
        Ok(driver.multi_call().await)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::strategy::mock::MockDriver;

    #[test]
    fn test_validation() {
        let strategy = ParallelStrategy;
        assert!(strategy.validate(&[]).is_err());
        assert!(strategy.validate(&[CallSpec::new("/a/b", "GET")]).is_err());
        assert!(strategy
            .validate(&[CallSpec::new("/a/b", "GET").key("a"), CallSpec::new("/a/c", "GET").key("a")])
            .is_err());
        assert!(strategy
            .validate(&[CallSpec::new("/a/b", "GET").key("a"), CallSpec::new("/a/c", "GET").key("b")])
            .is_ok());
    }

    #[test]
    fn test_keys_are_compared_as_given() {
        let strategy = ParallelStrategy;
        assert!(strategy
            .validate(&[CallSpec::new("/a/b", "GET").key("a"), CallSpec::new("/a/c", "GET").key("a ")])
            .is_ok());
        assert!(strategy.validate(&[CallSpec::new("/a/b", "GET").key("")]).is_err());
    }

    #[tokio::test]
    async fn test_every_key_gets_a_slot() {
        let mut driver = MockDriver::with_replies(vec![
            Err(CallError::Transport { code: 28, message: "key a: response timed out".into() }),
            Ok(json!({"x": 1})),
        ]);
        let calls = vec![CallSpec::new("/s/a", "GET").key("a"), CallSpec::new("/s/b", "GET").key("b")];
        let custom = CallOptions::default().timeout_ms(100);

        let result = ParallelStrategy.execute(&mut driver, calls, Some(custom.clone())).await.unwrap();
        assert_eq!(result["status"], json!(1));
        assert_eq!(result["data"]["b"], json!({"x": 1}));
        assert!(result["data"]["a"].is_string());
        assert_eq!(driver.multi_overrides(), vec![Some(custom.clone()), Some(custom)]);
    }
}
