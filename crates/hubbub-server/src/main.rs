//! hubbub-server: WebSocket chat relay.
//!
//! Accepts WebSocket connections, authenticates clients against the
//! credential store, routes room chat / DMs / notices through a single
//! dispatcher task, and appends every message to a durable transcript.

mod auth;
mod config;
mod dispatcher;
mod registry;
mod server;
mod store;
mod transport;

use clap::Parser;
use config::ServerConfig;
use server::ChatServer;
use std::path::PathBuf;
use tracing::{error, info};

/// hubbub-server: WebSocket chat relay
#[derive(Parser, Debug)]
#[command(name = "hubbub-server", version, about = "WebSocket chat relay server")]
struct Cli {
    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// WebSocket endpoint path
    #[arg(long)]
    path: Option<String>,

    /// Directory holding users.json and messages.json
    #[arg(long)]
    data_dir: Option<String>,

    /// Config file path
    #[arg(long, default_value = "~/.hubbub/config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    use tracing_subscriber::EnvFilter;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting hubbub-server");

    let config_path = PathBuf::from(&cli.config);
    let server_config = match ServerConfig::load(
        Some(&config_path),
        cli.port,
        cli.path.as_deref(),
        cli.data_dir.as_deref(),
    ) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let server = ChatServer::new(server_config);
    if let Err(e) = server.run(shutdown_signal()).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }

    info!("hubbub-server stopped");
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
