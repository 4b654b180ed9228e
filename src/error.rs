//! Error taxonomy shared by every layer.
//!
//! `CallError` is what resolvers, drivers and strategies produce. The facade
//! wraps it into `RpcError`, which carries the `{message, code, detail}`
//! triple callers inspect.

use std::fmt;

use thiserror::Error;

/// Code reported for failures that never reached a server.
pub const LOCAL_FAILURE_CODE: i64 = 500;

/// Category of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed call set; nothing was sent.
    Validation,
    /// Unknown module or service reference; nothing was sent.
    Resolution,
    /// Connection refused, DNS, TLS, timeout.
    Transport,
    /// Non-success HTTP or binary RPC status.
    Protocol,
    /// Response body is not a structured map.
    Schema,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Resolution => "resolution",
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Schema => "schema",
        };
        f.write_str(name)
    }
}

/// Failure of one call or of a call set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Resolution(String),

    /// `code` is a transfer error code (see `response::codes`).
    #[error("{message}")]
    Transport { code: u32, message: String },

    /// `code` is the HTTP status or binary RPC status.
    #[error("{message}")]
    Protocol { code: u32, message: String },

    #[error("{message}")]
    Schema { message: String },
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::Validation(_) => ErrorKind::Validation,
            CallError::Resolution(_) => ErrorKind::Resolution,
            CallError::Transport { .. } => ErrorKind::Transport,
            CallError::Protocol { .. } => ErrorKind::Protocol,
            CallError::Schema { .. } => ErrorKind::Schema,
        }
    }

    /// Numeric code surfaced through `RpcError::code`.
    pub fn code(&self) -> i64 {
        match self {
            CallError::Transport { code, .. } | CallError::Protocol { code, .. } => {
                i64::from(*code)
            }
            _ => LOCAL_FAILURE_CODE,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Error returned by `RequestContext::get`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RpcError {
    pub kind: ErrorKind,
    pub message: String,
    pub code: i64,
    pub detail: String,
}

impl RpcError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, code: i64) -> Self {
        let message = message.into();
        Self {
            detail: format!("{kind} error: {message}"),
            kind,
            message,
            code,
        }
    }
}

impl From<CallError> for RpcError {
    fn from(err: CallError) -> Self {
        RpcError::new(err.kind(), err.message(), err.code())
    }
}

/// Result type for single calls and call sets.
pub type CallResult<T> = Result<T, CallError>;
