//! Engine construction and serving.
//!
//! # Responsibilities
//! - Build an axum Router with no middleware, then apply startup options in order
//! - Register the health probes
//! - Serve with peer addresses available to middleware and graceful shutdown
//!
//! # Design Decisions
//! - The first option applied is the outermost layer: requests pass through
//!   options in the order they were supplied
//! - Layers are attached when the engine is finalised, so application routes
//!   added afterwards are wrapped as well
//! - Any option failure aborts construction; there is no partially configured engine

use std::net::SocketAddr;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::MethodRouter,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::{AccessLogTarget, LoggingStrategy, ServerConfig};
use crate::health;
use crate::http::middleware::{
    access_log_middleware, cors_middleware, recovery, request_logger_middleware, AccessLog,
    RequestLogger,
};
use crate::lifecycle::shutdown_signal;

/// Errors raised while building the engine.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server option {name} failed: {source}")]
    Option {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// A named startup transformation of the engine.
#[derive(Debug, Clone)]
pub enum ServerOption {
    /// Catch handler panics and answer 500.
    Recovery,
    /// `tower_http` trace spans into `tracing`.
    Trace,
    /// Plain one-line access log.
    AccessLog(AccessLogTarget),
    /// Plain one-line access log to an already opened writer.
    AccessLogWriter(AccessLog),
    /// Structured request/response records.
    RequestLogger(RequestLogger),
    /// Echo-origin CORS.
    Cors,
}

impl ServerOption {
    /// Name used in logs and in [`ServerError::Option`].
    pub fn name(&self) -> &'static str {
        match self {
            ServerOption::Recovery => "recovery",
            ServerOption::Trace => "trace",
            ServerOption::AccessLog(_) | ServerOption::AccessLogWriter(_) => "access_log",
            ServerOption::RequestLogger(_) => "request_logger",
            ServerOption::Cors => "cors",
        }
    }
}

/// Option after any fallible setup (opening files) has succeeded.
enum Installed {
    Recovery,
    Trace,
    AccessLog(AccessLog),
    RequestLogger(RequestLogger),
    Cors,
}

/// Router plus the ordered middleware it will be wrapped in.
pub struct Engine {
    router: Router,
    middleware: Vec<Installed>,
}

impl Engine {
    /// Apply `options` in order and register the health probes.
    pub fn new<I>(options: I) -> Result<Self, ServerError>
    where
        I: IntoIterator<Item = ServerOption>,
    {
        let mut middleware = Vec::new();
        for option in options {
            let name = option.name();
            let installed = install(option).map_err(|source| ServerError::Option { name, source })?;
            tracing::debug!(option = name, "Server option applied");
            middleware.push(installed);
        }

        Ok(Self {
            router: health::router(),
            middleware,
        })
    }

    /// Structured trace logging, panic recovery and CORS, in that order.
    pub fn default_server() -> Result<Self, ServerError> {
        Self::new([ServerOption::Trace, ServerOption::Recovery, ServerOption::Cors])
    }

    /// Engine whose options are derived from `config.middleware`.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        Self::new(options_from_config(config))
    }

    /// Add an application route.
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.router = self.router.route(path, method_router);
        self
    }

    /// Merge another router's routes into the engine.
    pub fn merge(mut self, other: Router) -> Self {
        self.router = self.router.merge(other);
        self
    }

    /// Wrap every route in the installed middleware.
    pub fn into_router(self) -> Router {
        let Self { router, middleware } = self;
        middleware
            .into_iter()
            .rev()
            .fold(router, |router, installed| match installed {
                Installed::Recovery => router.layer(recovery::layer()),
                Installed::Trace => router.layer(TraceLayer::new_for_http()),
                Installed::AccessLog(log) => {
                    router.layer(from_fn_with_state(log, access_log_middleware))
                }
                Installed::RequestLogger(logger) => {
                    router.layer(from_fn_with_state(logger, request_logger_middleware))
                }
                Installed::Cors => router.layer(from_fn(cors_middleware)),
            })
    }
}

fn install(option: ServerOption) -> std::io::Result<Installed> {
    Ok(match option {
        ServerOption::Recovery => Installed::Recovery,
        ServerOption::Trace => Installed::Trace,
        ServerOption::AccessLog(target) => Installed::AccessLog(AccessLog::open(&target)?),
        ServerOption::AccessLogWriter(log) => Installed::AccessLog(log),
        ServerOption::RequestLogger(logger) => Installed::RequestLogger(logger),
        ServerOption::Cors => Installed::Cors,
    })
}

/// Options in the order logging → recovery → CORS.
pub fn options_from_config(config: &ServerConfig) -> Vec<ServerOption> {
    let middleware = &config.middleware;
    let mut options = Vec::new();

    match middleware.logging {
        LoggingStrategy::None => {}
        LoggingStrategy::Trace => options.push(ServerOption::Trace),
        LoggingStrategy::AccessLog => {
            options.push(ServerOption::AccessLog(middleware.access_log.clone()))
        }
        LoggingStrategy::Structured => options.push(ServerOption::RequestLogger(
            RequestLogger::tracing(config.request_logger.clone()),
        )),
    }
    if middleware.recovery {
        options.push(ServerOption::Recovery);
    }
    if middleware.cors {
        options.push(ServerOption::Cors);
    }

    options
}

/// HTTP server for a finished engine.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Finalise `engine` into a servable router.
    pub fn new(engine: Engine) -> Self {
        Self {
            router: engine.into_router(),
        }
    }

    /// Run until Ctrl-C, SIGTERM or a message on `shutdown`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown.recv() => {}
                    () = shutdown_signal() => {}
                }
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequestLoggerConfig;
    use crate::observability::sink::{LogRecord, MemorySink};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        routing::post,
    };
    use std::io::Write;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn call(router: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_probes_independent_of_options() {
        let option_sets = vec![
            vec![],
            vec![ServerOption::Recovery],
            vec![ServerOption::Trace, ServerOption::Recovery, ServerOption::Cors],
            vec![ServerOption::RequestLogger(RequestLogger::new(
                Arc::new(MemorySink::new()),
                RequestLoggerConfig::default(),
            ))],
        ];

        for options in option_sets {
            let engine = Engine::new(options).unwrap();
            let router = engine.into_router();
            for path in ["/ready", "/healthy"] {
                let request = Request::get(path)
                    .header(header::ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap();
                let (status, body) = call(router.clone(), request).await;
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body, "ok");
            }
        }
    }

    #[tokio::test]
    async fn test_default_server_applies_cors() {
        let router = Engine::default_server().unwrap().into_router();
        let response = router
            .oneshot(
                Request::get("/ready")
                    .header(header::ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );
    }

    #[tokio::test]
    async fn test_routes_added_later_are_wrapped() {
        let sink = Arc::new(MemorySink::new());
        let router = Engine::new([ServerOption::RequestLogger(RequestLogger::new(
            sink.clone(),
            RequestLoggerConfig::default(),
        ))])
        .unwrap()
        .route("/orders", post(|| async { "created" }))
        .into_router();

        let (status, body) = call(
            router,
            Request::post("/orders").body(Body::from("{}")).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "created");

        let kinds: Vec<&str> = sink.records().iter().map(LogRecord::kind).collect();
        assert_eq!(kinds, vec!["request", "response"]);
    }

    #[tokio::test]
    async fn test_first_option_is_outermost() {
        // Logger before CORS: the logger observes the preflight answer CORS produced.
        let sink = Arc::new(MemorySink::new());
        let logger = RequestLogger::new(sink.clone(), RequestLoggerConfig::default());
        let router = Engine::new([ServerOption::RequestLogger(logger), ServerOption::Cors])
            .unwrap()
            .into_router();

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/ready")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(router, request).await;
        assert_eq!(status, StatusCode::OK);

        match sink.records().last() {
            Some(LogRecord::Response(res)) => {
                assert_eq!(res.status, 200);
                assert_eq!(
                    res.resp_body.get("_text"),
                    Some(&serde_json::json!("\"Options Request!\""))
                );
            }
            other => panic!("expected response record, got {other:?}"),
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_access_log_to_custom_writer() {
        let buf = SharedBuf::default();
        let option = ServerOption::AccessLogWriter(AccessLog::from_writer(buf.clone()));
        assert_eq!(option.name(), "access_log");

        let router = Engine::new([option]).unwrap().into_router();
        let (status, _) = call(router, Request::get("/healthy").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);

        let output = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("\"/healthy\""));
    }

    #[test]
    fn test_failing_option_aborts() {
        let target = AccessLogTarget::File("/nonexistent-dir/for/access.log".into());
        let result = Engine::new([ServerOption::Recovery, ServerOption::AccessLog(target)]);
        match result {
            Err(ServerError::Option { name, .. }) => assert_eq!(name, "access_log"),
            Ok(_) => panic!("engine should not build"),
        }
    }

    #[test]
    fn test_options_from_config_order() {
        let mut config = ServerConfig::default();
        config.middleware.logging = LoggingStrategy::Structured;
        let names: Vec<&str> = options_from_config(&config)
            .iter()
            .map(ServerOption::name)
            .collect();
        assert_eq!(names, vec!["request_logger", "recovery", "cors"]);

        config.middleware.logging = LoggingStrategy::None;
        config.middleware.cors = false;
        let names: Vec<&str> = options_from_config(&config)
            .iter()
            .map(ServerOption::name)
            .collect();
        assert_eq!(names, vec!["recovery"]);
    }
}
