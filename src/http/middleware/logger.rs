//! Structured request/response logging.
//!
//! # Data Flow
//! ```text
//! request
//!     → peek at the body head, replay it         (downstream sees it unread)
//!     → emit "visit request"                    (method, route, ip, body, uri, headers)
//!     → downstream chain
//!     → wrap response body in CaptureBody
//!     → client receives body
//!     → emit "visit response"                   (status, size, latency, errors, body)
//! ```
//!
//! # Design Decisions
//! - The sink is injected; nothing here touches a global logger
//! - Logging failures are reported through `tracing` and never fail the request
//! - The response record fires when the body completes, so latency covers it

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tracing::{error, warn};

use crate::config::RequestLoggerConfig;
use crate::http::middleware::body::{classify, ERROR_FIELD};
use crate::http::middleware::capture::capture_response;
use crate::http::middleware::replay::peek;
use crate::http::request::{client_ip, header_fields};
use crate::observability::sink::{LogRecord, LogSink, RequestRecord, ResponseRecord, TracingSink};

/// Errors a handler attached to its response.
///
/// Handlers report failures by inserting this into the response extensions
/// (see [`HandlerErrors::record`]); the logger copies them into the
/// `failed` field of the response record.
#[derive(Debug, Clone, Default)]
pub struct HandlerErrors(Vec<String>);

impl HandlerErrors {
    /// Add one error message.
    pub fn push(&mut self, err: impl fmt::Display) {
        self.0.push(err.to_string());
    }

    /// Messages in the order they were added.
    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// Append `err` to the errors carried by `response`.
    pub fn record(response: &mut Response, err: impl fmt::Display) {
        match response.extensions_mut().get_mut::<HandlerErrors>() {
            Some(errors) => errors.push(err),
            None => {
                let mut errors = HandlerErrors::default();
                errors.push(err);
                response.extensions_mut().insert(errors);
            }
        }
    }
}

/// Middleware state: where records go and how much request body to log.
#[derive(Clone)]
pub struct RequestLogger {
    sink: Arc<dyn LogSink>,
    config: RequestLoggerConfig,
}

impl RequestLogger {
    /// Logger emitting to `sink`.
    pub fn new(sink: Arc<dyn LogSink>, config: RequestLoggerConfig) -> Self {
        Self { sink, config }
    }

    /// Logger that emits through `tracing`.
    pub fn tracing(config: RequestLoggerConfig) -> Self {
        Self::new(Arc::new(TracingSink), config)
    }

    fn emit(&self, record: LogRecord) {
        if let Err(err) = self.sink.emit(&record) {
            warn!(error = %err, kind = record.kind(), "Failed to emit access log record");
        }
    }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Emit a request record, run the chain, then emit a response record once
/// the response body has been sent.
pub async fn request_logger_middleware(
    State(logger): State<RequestLogger>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let limit = logger.config.max_body_bytes;
    let peeked = peek(body, limit).await;
    if let Some(err) = &peeked.read_error {
        error!(error = %err, "Failed to read request body");
    }
    let mut logged_body = classify(&peeked.logged);
    if peeked.truncated {
        let note = format!("request body exceeds {limit} bytes, only the first {limit} are logged");
        logged_body.insert(ERROR_FIELD.to_string(), Value::String(note));
    }

    let method = parts.method.to_string();
    let route = parts
        .extensions
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_default();

    logger.emit(LogRecord::Request(RequestRecord {
        method: method.clone(),
        uri: route.clone(),
        ip: client_ip(&parts.headers, &parts.extensions),
        body: logged_body,
        full_uri: parts.uri.to_string(),
        header: header_fields(&parts.headers),
    }));

    let start = Instant::now();
    let response = next.run(Request::from_parts(parts, peeked.body)).await;

    let failed = response
        .extensions()
        .get::<HandlerErrors>()
        .map(|errors| errors.messages().to_vec())
        .unwrap_or_default();

    capture_response(response, move |captured| {
        logger.emit(LogRecord::Response(ResponseRecord {
            method,
            uri: route,
            status: captured.status.as_u16(),
            size: captured.size,
            latency: start.elapsed(),
            failed,
            resp_body: classify(captured.body()),
        }));
    })
}
