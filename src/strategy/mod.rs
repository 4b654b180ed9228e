//! Call strategies.
//!
//! # Data Flow
//! ```text
//! RequestContext::get()
//!     → Strategy::validate(calls)      nothing is sent on failure
//!     → Strategy::execute(driver, calls, custom options)
//!         serial.rs:   set_params → call → callback → next call
//!         parallel.rs: set_multi_params → multi_call
//! ```
//!
//! # Design Decisions
//! - Serial chains stop at the first raised error
//! - Parallel execution never raises once validation has passed

pub mod parallel;
pub mod serial;

use async_trait::async_trait;
use serde_json::Value;

use crate::driver::Driver;
use crate::error::CallError;
use crate::request::{CallOptions, CallSpec};

pub use parallel::ParallelStrategy;
pub use serial::{SerialChain, SerialState, SerialStrategy};

/// How a call set is executed.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn is_parallel(&self) -> bool;

    /// Check the shape of the call set.
    fn validate(&self, calls: &[CallSpec]) -> Result<(), CallError>;

    /// Run a validated call set. `custom` holds the one-shot options of the
    /// context.
    async fn execute(
        &self,
        driver: &mut dyn Driver,
        calls: Vec<CallSpec>,
        custom: Option<CallOptions>,
    ) -> Result<Value, CallError>;
}

pub fn for_mode(parallel: bool) -> Box<dyn Strategy> {
    if parallel {
        Box::new(ParallelStrategy)
    } else {
        Box::new(SerialStrategy)
    }
}

/// Entry checks shared by both strategies.
pub(crate) fn validate_entry(index: usize, call: &CallSpec) -> Result<(), CallError> {
    let service_ref = call.service_ref.trim();
    if service_ref.is_empty() {
        return Err(CallError::Validation(format!("call #{index} has no service reference")));
    }
    if !call.is_external && service_ref.contains("://") {
        return Err(CallError::Validation(format!(
            "call #{index} uses absolute url '{service_ref}' without the external flag"
        )));
    }
    if call.method.trim().is_empty() {
        return Err(CallError::Validation(format!("call #{index} has no method")));
    }
    Ok(())
}
