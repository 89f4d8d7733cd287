//! Liveness and readiness probes.
//!
//! | Probe | Path |
//! |---|---|
//! | Readiness | `GET /ready` |
//! | Liveness | `GET /healthy` |
//!
//! Both answer `200 OK` with body `ok` for as long as the process can serve
//! HTTP at all. They carry no dependency checks and ignore server options.

use axum::{routing::get, Router};

pub const READY_PATH: &str = "/ready";
pub const HEALTHY_PATH: &str = "/healthy";

/// Readiness probe.
pub async fn ready() -> &'static str {
    "ok"
}

/// Liveness probe.
pub async fn healthy() -> &'static str {
    "ok"
}

/// Router holding both probe routes.
pub fn router() -> Router {
    Router::new()
        .route(READY_PATH, get(ready))
        .route(HEALTHY_PATH, get(healthy))
}
