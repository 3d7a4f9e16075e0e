//! Tunnelbench tool server - serves test files and drives tunnel tools

mod config;
mod files;
mod routes;
mod tunnel;
mod webtest;

use anyhow::{Context, Result};
use clap::Parser;
use files::FileCatalog;
use routes::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tunnel::TunnelSession;

#[derive(Parser, Debug)]
#[command(author = "Florian Schüller <schuellerf@gmail.com>")]
#[command(version)]
#[command(about = "Tunnelbench tool server - test files and tunnel control", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "tunnelbench-server.toml")]
    config: String,

    /// Override the listening port (also the port tunnels expose)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting tunnelbench server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::Config::load_or_default(&args.config)
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.general.port = port;
    }

    let catalog = FileCatalog::prepare(&config.files)
        .await
        .context("Failed to prepare test files")?;
    let page = webtest::render(&config.webtest, &catalog.list());
    info!("Web test page is {} bytes", page.len());

    let session = Arc::new(TunnelSession::new(config.general.port));
    let state = AppState {
        catalog: Arc::new(catalog),
        session: session.clone(),
        webtest_page: Arc::new(page),
    };

    let addr = format!("{}:{}", config.general.bind_address, config.general.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down, stopping any active tunnel");
    session.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
