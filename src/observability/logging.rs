//! Structured logging and per-call log records.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for binaries
//! - Build one `LogRecord` per executed call
//! - Filter records by level and duration, then flush them to a sink
//!
//! # Design Decisions
//! - Uses tracing crate for diagnostics; `LogSink` is only for call records
//! - Records are flushed once per request context, never per call
//! - Sink failures are logged and swallowed so they never fail a call

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ErrorConfig, LogConfig, LogDriver, LogLevel};

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// What happened during one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub request_id: String,
    pub key: String,
    pub url: String,
    pub method: String,
    /// Headers as `Key: value` lines.
    pub headers: Vec<String>,
    pub params: Value,
    /// Unix time in seconds when the call was dispatched.
    pub request_time: f64,
    /// Duration in seconds.
    pub use_time: f64,
    /// Final result, or the error message of a failed call.
    pub result: Value,
    /// Raw response text before normalisation.
    pub origin_response: String,
    pub level: LogLevel,
}

impl LogRecord {
    pub fn use_time_ms(&self) -> f64 {
        self.use_time * 1000.0
    }
}

/// Level of a call record: `error` for failures and fail codes, `info` for
/// success codes, `debug` for anything else.
pub fn classify(result: &Value, failed: bool, error: &ErrorConfig) -> LogLevel {
    if failed {
        return LogLevel::Error;
    }
    match result.get(&error.code_key).and_then(Value::as_i64) {
        Some(code) if error.success_code.contains(&code) => LogLevel::Info,
        Some(code) if error.fail_code.contains(&code) => LogLevel::Error,
        _ => LogLevel::Debug,
    }
}

/// Records that pass the level set and the `info` duration threshold.
pub fn select(records: Vec<LogRecord>, config: &LogConfig) -> Vec<LogRecord> {
    records
        .into_iter()
        .filter(|record| config.levels.contains(&record.level))
        .filter(|record| {
            record.level != LogLevel::Info || record.use_time_ms() >= config.info_min_time as f64
        })
        .collect()
}

/// Flush `records` to `sink`. Absent sink or empty level set drops them.
pub fn flush(sink: Option<&dyn LogSink>, config: &LogConfig, records: Vec<LogRecord>) {
    let Some(sink) = sink else {
        return;
    };
    if config.levels.is_empty() || records.is_empty() {
        return;
    }

    let selected = select(records, config);
    if selected.is_empty() {
        return;
    }

    if let Err(e) = sink.write(&config.file, &selected) {
        tracing::error!(log = %config.file, error = %e, "Failed to flush call records");
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("log sink io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination of flushed call records.
pub trait LogSink: Send + Sync {
    fn write(&self, log_name: &str, records: &[LogRecord]) -> Result<(), SinkError>;
}

/// Build the sink selected by `logs.driver`.
pub fn sink_from_config(config: &LogConfig) -> Option<Arc<dyn LogSink>> {
    match config.driver {
        LogDriver::None => None,
        LogDriver::Tracing => Some(Arc::new(TracingSink)),
        LogDriver::File => Some(Arc::new(FileSink::new(&config.path))),
    }
}

/// Emits every record as a tracing event at its level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, log_name: &str, records: &[LogRecord]) -> Result<(), SinkError> {
        for record in records {
            match record.level {
                LogLevel::Info => tracing::info!(
                    log = %log_name,
                    request_id = %record.request_id,
                    key = %record.key,
                    url = %record.url,
                    method = %record.method,
                    use_time_ms = record.use_time_ms(),
                    result = %record.result,
                    "rpc call"
                ),
                LogLevel::Error => tracing::error!(
                    log = %log_name,
                    request_id = %record.request_id,
                    key = %record.key,
                    url = %record.url,
                    method = %record.method,
                    use_time_ms = record.use_time_ms(),
                    result = %record.result,
                    origin_response = %record.origin_response,
                    "rpc call failed"
                ),
                LogLevel::Debug => tracing::debug!(
                    log = %log_name,
                    request_id = %record.request_id,
                    key = %record.key,
                    url = %record.url,
                    method = %record.method,
                    use_time_ms = record.use_time_ms(),
                    result = %record.result,
                    "rpc call"
                ),
            }
        }
        Ok(())
    }
}

/// Appends JSON lines to `<dir>/<log_name>.log`.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, log_name: &str) -> PathBuf {
        self.dir.join(format!("{log_name}.log"))
    }
}

impl LogSink for FileSink {
    fn write(&self, log_name: &str, records: &[LogRecord]) -> Result<(), SinkError> {
        fs::create_dir_all(&self.dir)?;

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(log_name))?;
        file.write_all(&buf)?;
        Ok(())
    }
}
