//! Raw transport outcome → structured result or typed error.

use serde_json::{Map, Value};

use crate::config::ErrorConfig;
use crate::error::CallError;
use crate::response::codes::{self, rpc_status, transfer};

/// Structured result map returned by a successful call.
pub type ResultMap = Map<String, Value>;

const NON_200_PREFIX: &str = "server responsed non-200 code ";
const MALFORMED_PREFIX: &str = "malformed response header";

/// What a transport produced for one call, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOutcome {
    /// HTTP response with any status.
    Http { status: u16, body: String },
    /// Binary RPC reply; `status == 0` carries the encoded return value,
    /// any other status carries the error message.
    Rpc { status: u32, payload: String },
    /// The request never produced a response.
    Transfer { code: u32, message: String },
}

impl RawOutcome {
    /// Raw text kept in the log record.
    pub fn raw_text(&self) -> &str {
        match self {
            RawOutcome::Http { body, .. } => body,
            RawOutcome::Rpc { payload, .. } => payload,
            RawOutcome::Transfer { message, .. } => message,
        }
    }
}

/// Interpret `outcome`. A non-empty `key` prefixes every error message.
pub fn normalize(outcome: &RawOutcome, key: &str) -> Result<ResultMap, CallError> {
    match outcome {
        RawOutcome::Http { status: 200, body } => decode_map(body, key),
        RawOutcome::Http { status, .. } => Err(CallError::Protocol {
            code: u32::from(*status),
            message: with_key(key, &codes::http_status_message(*status)),
        }),
        RawOutcome::Rpc { status: rpc_status::OK, payload } => {
            decode_map(payload.trim().trim_matches('\''), key)
        }
        RawOutcome::Rpc { status, payload } => Err(rpc_failure(*status, payload, key)),
        RawOutcome::Transfer { code, .. } => Err(CallError::Transport {
            code: *code,
            message: with_key(key, codes::transfer_message(*code)),
        }),
    }
}

/// Degraded envelope `{code_key: fail_value, msg_key: message}`.
pub fn degraded(config: &ErrorConfig, message: impl Into<String>) -> Value {
    let mut map = Map::new();
    map.insert(config.code_key.clone(), Value::from(config.fail_value()));
    map.insert(config.msg_key.clone(), Value::String(message.into()));
    Value::Object(map)
}

fn decode_map(text: &str, key: &str) -> Result<ResultMap, CallError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(CallError::Schema { message: with_key(key, codes::SCHEMA_INVALID) }),
    }
}

/// Drop the framing prefix so the remaining text is classified on its own.
fn strip_malformed(payload: &str) -> &str {
    match payload.strip_prefix(MALFORMED_PREFIX) {
        Some(rest) => rest.trim_start_matches(':').trim().trim_matches('\''),
        None => payload,
    }
}

fn rpc_failure(status: u32, payload: &str, key: &str) -> CallError {
    let payload = strip_malformed(payload);
    if status != rpc_status::TRANSPORT {
        let detail = if payload.is_empty() {
            codes::rpc_status_message(status)
        } else {
            payload
        };
        return CallError::Protocol {
            code: status,
            message: with_key(key, &format!("service exception: {detail}")),
        };
    }

    let lowered = payload.to_ascii_lowercase();
    if lowered.contains("timeout") || lowered.contains("timed out") {
        return CallError::Transport {
            code: transfer::OPERATION_TIMEDOUT,
            message: with_key(key, codes::SERVICE_TIMED_OUT),
        };
    }
    if lowered.contains("couldn't connect") || lowered.contains("could not connect") {
        return CallError::Transport {
            code: transfer::COULDNT_CONNECT,
            message: with_key(key, codes::SERVICE_CONNECT_FAILED),
        };
    }

    let unwrapped = payload
        .strip_prefix(NON_200_PREFIX)
        .map(|rest| rest.trim().trim_matches('\''));
    match unwrapped.and_then(|code| code.parse::<u16>().ok()) {
        Some(http_status) => CallError::Protocol {
            code: u32::from(http_status),
            message: with_key(key, &codes::http_status_message(http_status)),
        },
        None => CallError::Transport {
            code: status,
            message: with_key(key, &format!("service exception: {payload}")),
        },
    }
}

/// Prefix `message` with `key <k>: ` when `key` is non-empty.
pub fn with_key(key: &str, message: &str) -> String {
    if key.is_empty() {
        message.to_string()
    } else {
        format!("key {key}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    fn http(status: u16, body: &str) -> RawOutcome {
        RawOutcome::Http { status, body: body.to_string() }
    }

    fn rpc(status: u32, payload: &str) -> RawOutcome {
        RawOutcome::Rpc { status, payload: payload.to_string() }
    }

    #[test]
    fn test_http_ok() {
        let map = normalize(&http(200, r#"{"status":1,"msg":"ok","data":{"id":7}}"#), "").unwrap();
        assert_eq!(map["data"], json!({"id": 7}));
    }

    #[test]
    fn test_http_ok_not_a_map() {
        let err = normalize(&http(200, "[1,2,3]"), "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.message(), "response data structure is invalid");

        let err = normalize(&http(200, "<html>"), "a").unwrap_err();
        assert_eq!(err.message(), "key a: response data structure is invalid");
    }

    #[test]
    fn test_http_statuses() {
        let err = normalize(&http(404, "nope"), "").unwrap_err();
        assert_eq!(err, CallError::Protocol { code: 404, message: "service url not found".into() });

        let err = normalize(&http(500, "boom"), "b").unwrap_err();
        assert_eq!(err.message(), "key b: service internal error");
        assert_eq!(err.code(), 500);

        let err = normalize(&http(302, ""), "").unwrap_err();
        assert_eq!(err.message(), "service exception: status 302");
    }

    #[test]
    fn test_transfer() {
        let outcome = RawOutcome::Transfer { code: 28, message: "operation timed out".into() };
        let err = normalize(&outcome, "a").unwrap_err();
        assert_eq!(err, CallError::Transport { code: 28, message: "key a: response timed out".into() });
    }

    #[test]
    fn test_rpc_success_trims_quotes() {
        let map = normalize(&rpc(0, r#"'{"status":1,"msg":"ok"}'"#), "").unwrap();
        assert_eq!(map["status"], json!(1));

        let err = normalize(&rpc(0, "\"plain\""), "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_rpc_non_200_unwrapped() {
        let err = normalize(&rpc(16, "server responsed non-200 code '404'"), "").unwrap_err();
        assert_eq!(err, CallError::Protocol { code: 404, message: "service url not found".into() });

        let err = normalize(&rpc(16, "server responsed non-200 code 502"), "").unwrap_err();
        assert_eq!(err.message(), "service exception: bad gateway");
    }

    #[test]
    fn test_rpc_transport_special_cases() {
        let err = normalize(&rpc(16, "Timeout was reached"), "k").unwrap_err();
        assert_eq!(err.message(), "key k: service response timed out");
        assert_eq!(err.code(), 28);

        let err = normalize(&rpc(16, "Couldn't connect to server"), "").unwrap_err();
        assert_eq!(err.message(), "connection to service failed");
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_rpc_other_status() {
        let err = normalize(&rpc(64, "division by zero"), "").unwrap_err();
        assert_eq!(err, CallError::Protocol { code: 64, message: "service exception: division by zero".into() });

        let err = normalize(&rpc(128, ""), "").unwrap_err();
        assert_eq!(err.message(), "service exception: empty response");
    }

    #[test]
    fn test_rpc_malformed_header_prefix_is_stripped() {
        let err = normalize(&rpc(2, "malformed response header: bad magic 0x0"), "k").unwrap_err();
        assert_eq!(err, CallError::Protocol { code: 2, message: "key k: service exception: bad magic 0x0".into() });

        let err = normalize(&rpc(16, "malformed response header 'server responsed non-200 code 404'"), "").unwrap_err();
        assert_eq!(err.code(), 404);
        assert_eq!(err.message(), "service url not found");
    }

    #[test]
    fn test_degraded_envelope() {
        let config = ErrorConfig { code_key: "code".into(), msg_key: "message".into(), fail_code: vec![-1], ..ErrorConfig::default() };
        assert_eq!(degraded(&config, "down"), json!({"code": -1, "message": "down"}));
    }
}
