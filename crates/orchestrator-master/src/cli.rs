use clap::Parser;

/// Orchestrator master: polls worker agents across a VM pool and keeps the
/// healthy instance count within configured bounds.
#[derive(Debug, Clone, Parser)]
#[command(name = "orchestrator-master", version, about)]
pub struct Cli {
    /// Path to the master config JSON file (app_info/worker_info/worker_limits/virtual_machines).
    #[arg(long, env = "CONFIG_MASTER")]
    pub config: String,

    /// Port the orchestrator HTTP API binds to.
    #[arg(long, env = "MASTER_API_PORT", default_value_t = 8080)]
    pub port: u16,

    /// SSH user used for `scp`/`ssh` to every worker VM.
    #[arg(long, env = "SSH_USER")]
    pub ssh_user: String,

    /// Log filter passed to `tracing_subscriber::EnvFilter` (e.g. `info`, `debug,orchestrator_engine=trace`).
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}
