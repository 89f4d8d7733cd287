//! Standalone server: health probes plus the configured middleware.
//!
//! ```text
//! http-scaffold --config server.toml
//! http-scaffold --bind 127.0.0.1:3000
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use http_scaffold::config::{load_config, ServerConfig};
use http_scaffold::observability::init_logging;
use http_scaffold::{Engine, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "http-scaffold")]
#[command(about = "HTTP server with health probes, request logging and CORS", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability)?;

    tracing::info!("http-scaffold v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        logging = ?config.middleware.logging,
        recovery = config.middleware.recovery,
        cors = config.middleware.cors,
        "Configuration loaded"
    );

    let engine = Engine::from_config(&config)?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    HttpServer::new(engine).run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
