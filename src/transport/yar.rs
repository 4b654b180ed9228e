//! Yar-over-HTTP framing for the binary RPC transport.
//!
//! A frame is an 82-byte header, an 8-byte packager name and the packed
//! body:
//!
//! ```text
//! 0        4        6          10         14             46             78        82         90
//! +--------+--------+----------+----------+--------------+--------------+---------+----------+------
//! | id u32 | ver u16| magic u32| rsvd u32 | provider[32] | token[32]    | len u32 | "JSON"   | body
//! +--------+--------+----------+----------+--------------+--------------+---------+----------+------
//! ```
//!
//! `len` counts the packager name plus the body. All integers are big endian.
//! Only the JSON packager is implemented.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use reqwest::header::{CONNECTION, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::config::Packager;
use crate::response::codes::rpc_status;
use crate::transport::{error_chain, ClientCache, RpcFailure, RpcRequest, RpcTransport};

pub const HEADER_LEN: usize = 82;
pub const PACKAGER_LEN: usize = 8;
pub const MAGIC: u32 = 0x80DF_EC60;
pub const VERSION: u16 = 0;

const PROVIDER_LEN: usize = 32;
const TOKEN_LEN: usize = 32;
const PROVIDER: &str = "rpc-courier";

/// Decoded reply header fields the client cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub id: u32,
    pub magic: u32,
    pub body_len: u32,
}

/// Encode one request frame.
pub fn encode_request(
    id: u32,
    method: &str,
    params: &Value,
    packager: Packager,
) -> Result<Vec<u8>, RpcFailure> {
    let args = match params {
        Value::Null => Value::Array(Vec::new()),
        other => Value::Array(vec![other.clone()]),
    };
    let body = serde_json::to_vec(&json!({ "i": id, "m": method, "p": args }))
        .map_err(|e| RpcFailure::new(rpc_status::PACKAGER, format!("pack request failed: {e}")))?;

    let body_len = u32::try_from(PACKAGER_LEN + body.len())
        .map_err(|_| RpcFailure::new(rpc_status::REQUEST, "request body too large"))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + PACKAGER_LEN + body.len());
    frame.extend_from_slice(&id.to_be_bytes());
    frame.extend_from_slice(&VERSION.to_be_bytes());
    frame.extend_from_slice(&MAGIC.to_be_bytes());
    frame.extend_from_slice(&0u32.to_be_bytes());
    frame.extend_from_slice(&fixed::<PROVIDER_LEN>(PROVIDER));
    frame.extend_from_slice(&fixed::<TOKEN_LEN>(""));
    frame.extend_from_slice(&body_len.to_be_bytes());
    frame.extend_from_slice(&fixed::<PACKAGER_LEN>(packager.wire_name()));
    frame.extend_from_slice(&body);

    Ok(frame)
}

/// Parse the fixed header of a reply frame.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, RpcFailure> {
    if bytes.len() < HEADER_LEN + PACKAGER_LEN {
        return Err(RpcFailure::new(
            rpc_status::PROTOCOL,
            format!("malformed response header: {} bytes", bytes.len()),
        ));
    }

    let header = FrameHeader {
        id: read_u32(bytes, 0),
        magic: read_u32(bytes, 6),
        body_len: read_u32(bytes, 78),
    };

    if header.magic != MAGIC {
        return Err(RpcFailure::new(
            rpc_status::PROTOCOL,
            format!("malformed response header: bad magic {:#x}", header.magic),
        ));
    }

    Ok(header)
}

/// Decode a reply frame into the encoded return value.
pub fn decode_response(bytes: &[u8], expected_id: u32) -> Result<String, RpcFailure> {
    if bytes.is_empty() {
        return Err(RpcFailure::new(rpc_status::EMPTY_RESPONSE, "empty response"));
    }

    let header = decode_header(bytes)?;
    let packager = String::from_utf8_lossy(&bytes[HEADER_LEN..HEADER_LEN + PACKAGER_LEN]);
    let packager = packager.trim_end_matches('\0');
    if !packager.eq_ignore_ascii_case(Packager::Json.wire_name()) {
        return Err(RpcFailure::new(
            rpc_status::PACKAGER,
            format!("unsupported packager '{packager}'"),
        ));
    }

    let body_end = HEADER_LEN + (header.body_len as usize).max(PACKAGER_LEN);
    let body = bytes
        .get(HEADER_LEN + PACKAGER_LEN..body_end)
        .ok_or_else(|| RpcFailure::new(rpc_status::PROTOCOL, "response body is truncated"))?;

    let reply: Value = serde_json::from_slice(body)
        .map_err(|e| RpcFailure::new(rpc_status::PACKAGER, format!("unpack response failed: {e}")))?;

    if let Some(id) = reply.get("i").and_then(Value::as_u64) {
        if id != u64::from(expected_id) {
            tracing::warn!(expected = expected_id, got = id, "Reply id mismatch");
        }
    }

    let status = reply.get("s").and_then(Value::as_u64).unwrap_or(0) as u32;
    if status != rpc_status::OK {
        return Err(RpcFailure::new(status, error_message(reply.get("e"))));
    }

    match reply.get("r") {
        None | Some(Value::Null) => Err(RpcFailure::new(rpc_status::EMPTY_RESPONSE, "empty response")),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Ok(other.to_string()),
    }
}

fn error_message(error: Option<&Value>) -> String {
    match error {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn fixed<const N: usize>(text: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let len = text.len().min(N);
    out[..len].copy_from_slice(&text.as_bytes()[..len]);
    out
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Binary RPC over HTTP POST.
#[derive(Debug)]
pub struct YarTransport {
    clients: ClientCache,
    packager: Packager,
    next_id: AtomicU32,
}

impl YarTransport {
    pub fn new(packager: Packager) -> Self {
        Self {
            clients: ClientCache::new(),
            packager,
            next_id: AtomicU32::new(1),
        }
    }
}

impl Default for YarTransport {
    fn default() -> Self {
        Self::new(Packager::Json)
    }
}

#[async_trait]
impl RpcTransport for YarTransport {
    async fn invoke(&self, request: RpcRequest) -> Result<String, RpcFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = encode_request(id, &request.method, &request.params, self.packager)?;

        let client = self
            .clients
            .get(request.connect_timeout, request.proxy.as_deref())
            .map_err(|e| RpcFailure::new(rpc_status::TRANSPORT, error_chain(&e)))?;

        let mut builder = client
            .post(request.url.clone())
            .timeout(request.timeout)
            .header(CONTENT_TYPE, "application/octet-stream");
        if !request.persistent {
            builder = builder.header(CONNECTION, "close");
        }
        for line in &request.metadata {
            if let Some((name, value)) = line.split_once(':') {
                builder = builder.header(name.trim(), value.trim());
            }
        }

        let response = builder.body(frame).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "Timeout was reached".to_string()
            } else if e.is_connect() {
                "Couldn't connect to server".to_string()
            } else {
                error_chain(&e)
            };
            RpcFailure::new(rpc_status::TRANSPORT, message)
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(RpcFailure::new(
                rpc_status::TRANSPORT,
                format!("server responsed non-200 code {}", status.as_u16()),
            ));
        }

        let bytes = response.bytes().await.map_err(|e| {
            let message = if e.is_timeout() {
                "Timeout was reached".to_string()
            } else {
                error_chain(&e)
            };
            RpcFailure::new(rpc_status::TRANSPORT, message)
        })?;

        decode_response(&bytes, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_frame(id: u32, reply: &Value) -> Vec<u8> {
        let body = serde_json::to_vec(reply).unwrap();
        let mut frame = Vec::new();
        frame.extend_from_slice(&id.to_be_bytes());
        frame.extend_from_slice(&VERSION.to_be_bytes());
        frame.extend_from_slice(&MAGIC.to_be_bytes());
        frame.extend_from_slice(&0u32.to_be_bytes());
        frame.extend_from_slice(&[0u8; 64]);
        frame.extend_from_slice(&((PACKAGER_LEN + body.len()) as u32).to_be_bytes());
        frame.extend_from_slice(&fixed::<PACKAGER_LEN>("JSON"));
        frame.extend_from_slice(&body);
        frame
    }

    #[test]
    fn test_encode_request_layout() {
        let frame = encode_request(7, "getInfo", &json!({"id": 3}), Packager::Json).unwrap();
        let header = decode_header(&frame).unwrap();
        assert_eq!(header.id, 7);
        assert_eq!(header.magic, MAGIC);
        assert_eq!(header.body_len as usize, frame.len() - HEADER_LEN);
        assert_eq!(&frame[10..14], &[0, 0, 0, 0]);
        assert_eq!(&frame[14..14 + PROVIDER.len()], PROVIDER.as_bytes());
        assert_eq!(&frame[HEADER_LEN..HEADER_LEN + 4], b"JSON");

        let body: Value = serde_json::from_slice(&frame[HEADER_LEN + PACKAGER_LEN..]).unwrap();
        assert_eq!(body, json!({"i": 7, "m": "getInfo", "p": [{"id": 3}]}));
    }

    #[test]
    fn test_encode_null_params() {
        let frame = encode_request(1, "ping", &Value::Null, Packager::Json).unwrap();
        let body: Value = serde_json::from_slice(&frame[HEADER_LEN + PACKAGER_LEN..]).unwrap();
        assert_eq!(body["p"], json!([]));
    }

    #[test]
    fn test_decode_success() {
        let frame = reply_frame(3, &json!({"i": 3, "s": 0, "r": {"status": 1, "msg": "ok"}, "o": "", "e": null}));
        let text = decode_response(&frame, 3).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), json!({"status": 1, "msg": "ok"}));

        let frame = reply_frame(3, &json!({"i": 3, "s": 0, "r": "{\"status\":1}"}));
        assert_eq!(decode_response(&frame, 3).unwrap(), "{\"status\":1}");
    }

    #[test]
    fn test_decode_remote_exception() {
        let frame = reply_frame(4, &json!({"i": 4, "s": 64, "e": {"message": "no such method", "code": 0}}));
        let err = decode_response(&frame, 4).unwrap_err();
        assert_eq!(err, RpcFailure::new(rpc_status::EXCEPTION, "no such method"));
    }

    #[test]
    fn test_decode_malformed() {
        assert_eq!(decode_response(&[], 1).unwrap_err().status, rpc_status::EMPTY_RESPONSE);
        assert_eq!(decode_response(b"<html>oops</html>", 1).unwrap_err().status, rpc_status::PROTOCOL);

        let mut frame = reply_frame(1, &json!({"s": 0, "r": 1}));
        frame[6] = 0;
        assert_eq!(decode_response(&frame, 1).unwrap_err().status, rpc_status::PROTOCOL);

        let mut frame = reply_frame(1, &json!({"s": 0, "r": 1}));
        frame[HEADER_LEN..HEADER_LEN + PACKAGER_LEN].copy_from_slice(&fixed::<PACKAGER_LEN>("PHP"));
        assert_eq!(decode_response(&frame, 1).unwrap_err().status, rpc_status::PACKAGER);
    }
}
