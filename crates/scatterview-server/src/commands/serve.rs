use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;
use tracing::info;

use scatterview_server::{build_router, AppState, ServerConfig};

use super::load_config;

#[derive(Args)]
pub struct ServeArgs {
    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, overrides the config
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Serve scans from the local data directory
    #[arg(long)]
    pub dev: bool,
}

pub fn run(args: &ServeArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if args.dev {
        config.dev_mode = true;
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(serve(config))
}

async fn serve(config: ServerConfig) -> Result<()> {
    let bind = config.bind;
    info!(
        bind = %bind,
        dev_mode = config.dev_mode,
        env_file = %config.env_file.display(),
        data_local_path = %config.source.data_local_path.display(),
        "Starting scatterview server"
    );

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    let app = build_router(AppState::new(config));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        // No signal handler: run until killed.
        Err(_) => std::future::pending::<()>().await,
    }
}
