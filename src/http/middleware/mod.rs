//! Middleware installed by [`Engine`](crate::http::Engine) options.
//!
//! # Data Flow
//! ```text
//! request
//!     → logging (trace / access_log / logger)
//!     → recovery.rs (panic → 500)
//!     → cors.rs (origin echo, preflight answer)
//!     → application handlers
//! ```
//!
//! `logger.rs` relies on `replay.rs` to read the request body without taking
//! it from handlers, on `capture.rs` to observe the response body and on
//! `body.rs` to render both into log fields.

pub mod access_log;
pub mod body;
pub mod capture;
pub mod cors;
pub mod logger;
pub mod recovery;
pub mod replay;

pub use access_log::{access_log_middleware, AccessLog};
pub use body::classify;
pub use capture::{capture_response, CaptureBody, CaptureError, CapturedResponse};
pub use cors::cors_middleware;
pub use logger::{request_logger_middleware, HandlerErrors, RequestLogger};
