//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Process logs:
//!     → logging.rs (tracing subscriber: level filter, pretty or JSON)
//!
//! Access records from the request logger:
//!     → sink.rs (LogSink: tracing, JSON lines, memory)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - The access-record sink is injected, never a process global

pub mod logging;
pub mod sink;

pub use logging::init_logging;
pub use sink::{
    JsonLinesSink, LogRecord, LogSink, MemorySink, RequestRecord, ResponseRecord, SinkError,
    TracingSink,
};
