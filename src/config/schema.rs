//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Which middleware the engine installs.
    pub middleware: MiddlewareConfig,

    /// Structured request logger settings.
    pub request_logger: RequestLoggerConfig,

    /// Process-wide logging settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Startup options, applied in the order logging → recovery → CORS.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Per-request logging strategy.
    pub logging: LoggingStrategy,

    /// Destination for the `access_log` strategy.
    pub access_log: AccessLogTarget,

    /// Catch handler panics and answer 500.
    pub recovery: bool,

    /// Echo-origin CORS headers and preflight answers.
    pub cors: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            logging: LoggingStrategy::Trace,
            access_log: AccessLogTarget::Stdout,
            recovery: true,
            cors: true,
        }
    }
}

/// How requests are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingStrategy {
    /// No request logging.
    None,
    /// `tower_http` trace spans, emitted through `tracing`.
    Trace,
    /// One plain line per request to [`MiddlewareConfig::access_log`].
    AccessLog,
    /// Request and response records including classified bodies.
    Structured,
}

/// Where the plain access log is written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLogTarget {
    Stdout,
    Stderr,
    File(PathBuf),
}

/// Structured request logger settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestLoggerConfig {
    /// Only this many leading bytes of a request body are logged. Handlers
    /// always receive the whole body.
    pub max_body_bytes: usize,
}

impl Default for RequestLoggerConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Output format of the process logger.
    pub format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format: human-readable for development, JSON for production.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
