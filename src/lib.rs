//! Thin HTTP server scaffolding: ordered startup options (recovery, request
//! logging, CORS) and health probes over axum.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServerConfig;
pub use http::{Engine, HttpServer, ServerOption};
pub use lifecycle::Shutdown;
