//! Call metrics.
//!
//! # Metrics
//! - `rpc_calls_total` (counter): calls by transport and outcome
//! - `rpc_call_duration_seconds` (histogram): latency by transport
//! - `rpc_fanout_size` (histogram): calls per parallel dispatch
//!
//! # Design Decisions
//! - The application installs the recorder; without one these are no-ops
//! - Outcome labels follow `ErrorKind`, plus `success`

use std::time::Instant;

use crate::error::ErrorKind;

/// Outcome label for a call.
pub fn outcome_label(kind: Option<ErrorKind>) -> &'static str {
    match kind {
        None => "success",
        Some(ErrorKind::Validation) => "validation",
        Some(ErrorKind::Resolution) => "resolution",
        Some(ErrorKind::Transport) => "transport",
        Some(ErrorKind::Protocol) => "protocol",
        Some(ErrorKind::Schema) => "schema",
    }
}

pub fn record_call(transport: &'static str, outcome: Option<ErrorKind>, start: Instant) {
    metrics::counter!(
        "rpc_calls_total",
        "transport" => transport,
        "outcome" => outcome_label(outcome)
    )
    .increment(1);
    metrics::histogram!("rpc_call_duration_seconds", "transport" => transport)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_fanout(transport: &'static str, size: usize) {
    metrics::histogram!("rpc_fanout_size", "transport" => transport).record(size as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(None), "success");
        assert_eq!(outcome_label(Some(ErrorKind::Transport)), "transport");
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_call("http", None, Instant::now());
        record_fanout("http", 3);
    }
}
