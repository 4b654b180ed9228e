//! Message tables for transfer codes, HTTP statuses and binary RPC statuses.

/// curl-compatible transfer error codes produced by the HTTP transport.
pub mod transfer {
    pub const UNSUPPORTED_PROTOCOL: u32 = 1;
    pub const URL_MALFORMAT: u32 = 3;
    pub const COULDNT_RESOLVE_PROXY: u32 = 5;
    pub const COULDNT_RESOLVE_HOST: u32 = 6;
    pub const COULDNT_CONNECT: u32 = 7;
    pub const OPERATION_TIMEDOUT: u32 = 28;
    pub const SSL_CONNECT_ERROR: u32 = 35;
    pub const TOO_MANY_REDIRECTS: u32 = 47;
    pub const GOT_NOTHING: u32 = 52;
    pub const SEND_ERROR: u32 = 55;
    pub const RECV_ERROR: u32 = 56;
    pub const UNKNOWN: u32 = 57;
}

/// Status codes reported by the binary RPC transport.
pub mod rpc_status {
    pub const OK: u32 = 0;
    pub const PACKAGER: u32 = 1;
    pub const PROTOCOL: u32 = 2;
    pub const REQUEST: u32 = 4;
    pub const OUTPUT: u32 = 8;
    pub const TRANSPORT: u32 = 16;
    pub const FORBIDDEN: u32 = 32;
    pub const EXCEPTION: u32 = 64;
    pub const EMPTY_RESPONSE: u32 = 128;
}

pub const SCHEMA_INVALID: &str = "response data structure is invalid";
pub const SERVICE_TIMED_OUT: &str = "service response timed out";
pub const SERVICE_CONNECT_FAILED: &str = "connection to service failed";

/// Message for a curl-compatible transfer error code.
pub fn transfer_message(code: u32) -> &'static str {
    match code {
        1 => "unsupported protocol",
        2 => "failed to initialize",
        3 => "url format is invalid",
        4 => "requested feature is not available",
        5 => "could not resolve proxy",
        6 => "could not resolve host",
        7 => "could not connect to host",
        8 => "remote server reply is unusable",
        9 => "access to remote resource denied",
        16 => "http/2 framing error",
        18 => "transfer ended before expected size",
        22 => "http error returned",
        23 => "failed writing received data",
        25 => "upload failed to start",
        26 => "failed reading data to send",
        27 => "out of memory",
        28 => "response timed out",
        33 => "range request not supported",
        35 => "tls handshake failed",
        42 => "aborted by callback",
        43 => "internal error",
        45 => "interface error",
        47 => "too many redirects",
        48 => "unknown option",
        52 => "server returned nothing",
        53 => "crypto engine not found",
        54 => "could not set default crypto engine",
        55 => "failed sending network data",
        56 => "failure receiving network data",
        58 => "problem with local client certificate",
        59 => "could not use specified cipher",
        60 => "peer certificate could not be verified",
        61 => "unrecognized transfer encoding",
        63 => "maximum file size exceeded",
        65 => "rewind failed",
        66 => "ssl engine initialization failed",
        67 => "login denied",
        77 => "problem reading ca certificate",
        78 => "remote resource not found",
        92 => "http/2 stream error",
        _ => "unknown error",
    }
}

/// Message for a non-success HTTP status.
pub fn http_status_message(status: u16) -> String {
    let text = match status {
        400 => "bad request",
        401 => "unauthorized",
        403 => "forbidden",
        404 => return "service url not found".to_string(),
        405 => "method not allowed",
        408 => "request timed out",
        429 => "too many requests",
        500 => return "service internal error".to_string(),
        502 => "bad gateway",
        503 => "service unavailable",
        504 => "gateway timed out",
        _ => return format!("service exception: status {status}"),
    };
    format!("service exception: {text}")
}

/// Message for a binary RPC failure status.
pub fn rpc_status_message(status: u32) -> &'static str {
    match status {
        rpc_status::PACKAGER => "packager error",
        rpc_status::PROTOCOL => "protocol error",
        rpc_status::REQUEST => "request error",
        rpc_status::OUTPUT => "output error",
        rpc_status::TRANSPORT => "transport error",
        rpc_status::FORBIDDEN => "forbidden",
        rpc_status::EXCEPTION => "remote exception",
        rpc_status::EMPTY_RESPONSE => "empty response",
        _ => "unknown error",
    }
}
