//! HTTP scaffolding on top of axum.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum serve, peer address, graceful shutdown)
//!     → middleware/ (installed by ServerOption, first option outermost)
//!     → health probes / application routes
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use server::{options_from_config, Engine, HttpServer, ServerError, ServerOption};
