//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Drivers produce per call:
//!     → LogRecord (url, headers, params, timing, result)
//!     → metrics.rs (counters, histograms)
//!     → tracing events (request_id, key, url, status)
//!
//! RequestContext::get() completes:
//!     → logging.rs select (levels, info_min_time)
//!     → LogSink::write(log_name, records)
//!         → TracingSink | FileSink | custom
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every record and event
//! - Metrics are cheap (atomic increments)
//! - Call records are a separate channel from diagnostics

pub mod logging;
pub mod metrics;

pub use logging::{
    classify, flush, init_tracing, select, sink_from_config, FileSink, LogRecord, LogSink,
    SinkError, TracingSink,
};
