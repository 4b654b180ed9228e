//! Request-side types.
//!
//! # Data Flow
//! ```text
//! RpcClient::build_request(calls, token, parallel)
//!     → RequestContext (RequestId generated once)
//!     → set_custom_options / with_origin (optional)
//!     → get(): Strategy::validate → Strategy::execute(driver)
//!     → flush log records → Result<Value, RpcError>
//! ```
//!
//! # Design Decisions
//! - Explicit context object; no process-wide request state
//! - Options and callbacks are typed, not string-keyed bags
//! - A context runs once

pub mod call;
pub mod context;
pub mod options;
pub mod origin;

pub use call::{CallSpec, Callback, Token};
pub use context::{RequestContext, RequestId};
pub use options::{CallOptions, ProxyOverride};
pub use origin::{CallerKind, ClientOrigin, DEFAULT_CLIENT_IP};
