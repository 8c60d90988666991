mod api;
mod cli;
mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use orchestrator_core::config::MasterConfig;
use orchestrator_engine::agent_client::{HttpAgentClient, DEFAULT_AGENT_TIMEOUT};
use orchestrator_engine::{AgentClient, Controller, Poller, WorkerRegistry};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::shutdown::{spawn_ctrl_c_handler, ShutdownController, ShutdownEvent};

/// Timeout applied to each `scp`/`ssh` remote-exec step. `spec.md` §5
/// leaves this to the implementer ("SHOULD add a timeout"); 90s covers a
/// slow image pull inside `deploy_worker.sh` without hanging forever on a
/// dead VM.
const REMOTE_EXEC_TIMEOUT: Duration = Duration::from_secs(90);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match MasterConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load master config");
            std::process::exit(1);
        }
    };

    tracing::info!(
        virtual_machines = config.virtual_machines.len(),
        min_workers = config.worker_limits.min_workers,
        max_workers = config.worker_limits.max_workers,
        "master config loaded"
    );

    let http = reqwest::Client::builder()
        .timeout(DEFAULT_AGENT_TIMEOUT)
        .build()?;
    let agent: Arc<dyn AgentClient> = Arc::new(HttpAgentClient::new(
        http,
        cli.ssh_user.clone(),
        config.worker_info.clone(),
        config.app_info.clone(),
        REMOTE_EXEC_TIMEOUT,
    ));

    let registry = Arc::new(WorkerRegistry::new());
    let controller = Arc::new(Controller::new(
        registry.clone(),
        agent.clone(),
        config.worker_limits,
        config.virtual_machines.clone(),
    ));
    let poller = Poller::new(
        registry.clone(),
        agent.clone(),
        controller,
        config.virtual_machines.clone(),
    );

    tokio::spawn(async move {
        poller.run().await;
    });

    let state = api::AppState {
        registry,
        agent,
        config: Arc::new(config),
    };
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cli.port)).await?;
    tracing::info!(port = cli.port, "orchestrator HTTP API listening");

    let shutdown = Arc::new(ShutdownController::new());
    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
    spawn_ctrl_c_handler(shutdown, shutdown_tx);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            match shutdown_rx.recv().await {
                Some(ShutdownEvent::Graceful) | None => {}
                Some(ShutdownEvent::Immediate) => std::process::exit(130),
            }
        })
        .await?;

    Ok(())
}
