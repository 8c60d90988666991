use clap::Parser;

/// Worker agent: the thin collaborator process `deploy_worker.sh` runs on
/// each VM, wrapping one application container.
#[derive(Debug, Clone, Parser)]
#[command(name = "orchestrator-worker", version, about)]
pub struct Cli {
    /// This worker's unique name, assigned by the master at deploy time.
    #[arg(long, env = "WORKER_NAME")]
    pub worker_name: String,

    /// Docker image for the application container.
    #[arg(long, env = "APP_IMAGE")]
    pub app_image: String,

    /// TCP port the application listens on inside its container.
    #[arg(long, env = "APP_PORT")]
    pub app_port: u16,

    /// HTTP path probed for application health. Empty disables the HTTP
    /// probe and falls back straight to "is the container running".
    #[arg(long, env = "HEALTHCHECK_API", default_value = "")]
    pub healthcheck_api: String,

    /// Dockerfile path, carried through for parity with the original
    /// worker config even though this agent does not build images itself.
    #[arg(long, env = "APP_DOCKERFILE", default_value = "")]
    pub app_dockerfile: String,

    /// Application git repository, carried through for the same reason.
    #[arg(long, env = "APP_GIT_REPO", default_value = "")]
    pub app_git_repo: String,

    /// Port this worker agent's own HTTP server listens on.
    #[arg(long, env = "WORKER_PORT")]
    pub worker_port: u16,

    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}
