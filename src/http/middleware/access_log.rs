//! Plain one-line access log.
//!
//! The lightweight alternative to the structured request logger: one line per
//! request, written to stdout, stderr or an append-only file.
//!
//! ```text
//! [HTTP] 2026/10/14 - 12:00:00 | 200 |      1.234ms |       127.0.0.1 | GET     "/ready"
//! ```

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Local;
use tracing::warn;

use crate::config::AccessLogTarget;
use crate::http::request::client_ip;

/// Shared line writer for the access log.
#[derive(Clone)]
pub struct AccessLog {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl AccessLog {
    /// Open the configured target. Files are created if missing and appended to.
    pub fn open(target: &AccessLogTarget) -> io::Result<Self> {
        let writer: Box<dyn Write + Send> = match target {
            AccessLogTarget::Stdout => Box::new(io::stdout()),
            AccessLogTarget::Stderr => Box::new(io::stderr()),
            AccessLogTarget::File(path) => {
                Box::new(OpenOptions::new().create(true).append(true).open(path)?)
            }
        };
        Ok(Self::from_writer(writer))
    }

    /// Log to an arbitrary writer.
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Write one line. Blocks on the writer; async callers go through
    /// [`AccessLog::write_line_blocking`].
    fn write_line(&self, line: &str) {
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = writeln!(writer, "{line}").and_then(|()| writer.flush()) {
            warn!(error = %err, "Failed to write access log line");
        }
    }

    /// Write one line on the blocking thread pool.
    async fn write_line_blocking(&self, line: String) {
        let log = self.clone();
        if let Err(err) = tokio::task::spawn_blocking(move || log.write_line(&line)).await {
            warn!(error = %err, "Access log writer task failed");
        }
    }
}

impl fmt::Debug for AccessLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLog").finish_non_exhaustive()
    }
}

/// Write one access line per request once the handler has answered.
pub async fn access_log_middleware(
    State(log): State<AccessLog>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    let ip = client_ip(request.headers(), request.extensions());

    let response = next.run(request).await;

    let timestamp = Local::now().format("%Y/%m/%d - %H:%M:%S").to_string();
    let line = format_line(&timestamp, response.status(), start.elapsed(), &ip, &method, &path);
    log.write_line_blocking(line).await;

    response
}

fn format_line(
    timestamp: &str,
    status: StatusCode,
    latency: Duration,
    ip: &str,
    method: &Method,
    path: &str,
) -> String {
    format!(
        "[HTTP] {timestamp} | {:>3} | {:>12} | {:>15} | {:<7} {:?}",
        status.as_u16(),
        format!("{latency:?}"),
        ip,
        method.as_str(),
        path,
    )
}
