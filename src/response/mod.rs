//! Response normalisation.
//!
//! # Data Flow
//! ```text
//! transport reply / transfer failure
//!     → RawOutcome { Http | Rpc | Transfer }
//!     → normalizer.rs (decode or classify)
//!     → Ok(ResultMap) | Err(CallError)
//!     → driver degrades to {code_key, msg_key} unless display_error
//! ```
//!
//! # Design Decisions
//! - Only a JSON object counts as a structured result
//! - Message tables live in codes.rs; the normalizer only picks entries

pub mod codes;
pub mod normalizer;

pub use normalizer::{degraded, normalize, with_key, RawOutcome, ResultMap};
