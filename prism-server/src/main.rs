use anyhow::{Context, Result};
use clap::Parser;
use prism_common::observability::init_logging;
use prism_config::{PrismConfig, PrismConfigLoader};
use prism_server::{AppState, build_router};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "prism", version, about = "Alternative views of the news")]
struct Cli {
    /// YAML configuration file; missing is fine, environment fills the gaps.
    #[arg(short, long, env = "PRISM_CONFIG", default_value = "prism.yaml")]
    config: PathBuf,

    /// Listen address, overriding `server.bind`.
    #[arg(short, long, env = "PRISM_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Load config (env wins)
    let mut cfg: PrismConfig = PrismConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if let Some(bind) = cli.bind {
        cfg.server.bind = bind;
    }

    let log_path = init_logging(cfg.logging.to_log_config("prism"))?;
    info!(log_dir = %log_path.display(), config = %cli.config.display(), "starting prism");

    let state = AppState::from_config(&cfg)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    info!(addr = %cfg.server.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
