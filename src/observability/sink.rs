//! Log records and the sinks they are emitted to.
//!
//! # Responsibilities
//! - Define the two records produced per request ("request" and "response")
//! - Abstract the destination behind [`LogSink`] so it can be injected
//!
//! # Design Decisions
//! - Records are typed; the field mapping is derived through serde
//! - Sinks report failures to the caller instead of panicking
//! - Sinks are shared across request tasks and must be `Send + Sync`

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::info;

/// Error returned by a [`LogSink`].
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to encode log record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write log record: {0}")]
    Io(#[from] std::io::Error),

    #[error("log sink lock poisoned")]
    Poisoned,
}

/// Emitted when a request enters the logging middleware.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub method: String,
    /// Matched route pattern, empty when no route matched.
    pub uri: String,
    pub ip: String,
    pub body: Map<String, Value>,
    pub full_uri: String,
    pub header: BTreeMap<String, Vec<String>>,
}

/// Emitted once the response body has been sent (or abandoned).
#[derive(Debug, Clone, Serialize)]
pub struct ResponseRecord {
    pub method: String,
    pub uri: String,
    pub status: u16,
    pub size: usize,
    #[serde(serialize_with = "serialize_latency")]
    pub latency: Duration,
    pub failed: Vec<String>,
    pub resp_body: Map<String, Value>,
}

fn serialize_latency<S: Serializer>(latency: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{} ns", latency.as_nanos()))
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogRecord {
    Request(RequestRecord),
    Response(ResponseRecord),
}

impl LogRecord {
    /// `"request"` or `"response"`.
    pub fn kind(&self) -> &'static str {
        match self {
            LogRecord::Request(_) => "request",
            LogRecord::Response(_) => "response",
        }
    }

    /// Field name to value mapping, without the `kind` tag.
    pub fn fields(&self) -> Map<String, Value> {
        let mut fields = match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        fields.remove("kind");
        fields
    }
}

/// Destination for access log records.
pub trait LogSink: Send + Sync + 'static {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError>;
}

/// Sends records through `tracing` at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        match record {
            LogRecord::Request(r) => {
                let body = serde_json::to_string(&r.body)?;
                let header = serde_json::to_string(&r.header)?;
                info!(
                    method = %r.method,
                    uri = %r.uri,
                    ip = %r.ip,
                    full_uri = %r.full_uri,
                    body = %body,
                    header = %header,
                    "visit request"
                );
            }
            LogRecord::Response(r) => {
                let resp_body = serde_json::to_string(&r.resp_body)?;
                info!(
                    method = %r.method,
                    uri = %r.uri,
                    status = r.status,
                    size = r.size,
                    latency = %format_args!("{} ns", r.latency.as_nanos()),
                    failed = ?r.failed,
                    resp_body = %resp_body,
                    "visit response"
                );
            }
        }
        Ok(())
    }
}

/// Writes one JSON object per line to `W`.
///
/// The writer is held behind a mutex so concurrent requests never interleave
/// partial records.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    /// Sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer, failing if a writer panicked mid-record.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer.into_inner().map_err(|_| SinkError::Poisoned)
    }
}

impl<W: Write + Send + 'static> LogSink for JsonLinesSink<W> {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps every record in memory. Intended for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records emitted so far.
    pub fn records(&self) -> Vec<LogRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LogSink for MemorySink {
    fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .map_err(|_| SinkError::Poisoned)?
            .push(record.clone());
        Ok(())
    }
}
