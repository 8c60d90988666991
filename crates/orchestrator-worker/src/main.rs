mod api;
mod app_runner;
mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use app_runner::{AppRunner, AppRunnerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let runner = Arc::new(AppRunner::new(AppRunnerConfig {
        worker_name: cli.worker_name.clone(),
        app_image: cli.app_image,
        app_port: cli.app_port,
        healthcheck_api: cli.healthcheck_api,
    }));

    let state = api::AppState {
        worker_name: cli.worker_name,
        runner,
    };
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cli.worker_port)).await?;
    tracing::info!(port = cli.worker_port, "worker agent listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
