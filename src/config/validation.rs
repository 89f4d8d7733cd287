//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (body limit > 0, address parses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use tracing::level_filters::LevelFilter;

use crate::config::schema::{AccessLogTarget, LoggingStrategy, ServerConfig};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address {0:?}")]
    BindAddress(String),

    #[error("request_logger.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("middleware.access_log file path is empty")]
    EmptyAccessLogPath,

    #[error("unknown log level {0:?}")]
    LogLevel(String),
}

/// Check `config`, returning every problem found rather than the first.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.request_logger.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if config.middleware.logging == LoggingStrategy::AccessLog {
        if let AccessLogTarget::File(path) = &config.middleware.access_log {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::EmptyAccessLogPath);
            }
        }
    }

    if config.observability.log_level.parse::<LevelFilter>().is_err() {
        errors.push(ValidationError::LogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
