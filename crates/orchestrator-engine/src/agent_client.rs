//! The worker agent client: HTTP calls against a running worker agent, plus
//! the remote-exec calls (scp + ssh) used to deploy a new one and tear one
//! down.

use std::time::Duration;

use async_trait::async_trait;
use orchestrator_core::config::{AppInfo, WorkerInfo};
use orchestrator_core::WorkerStatus;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::process::Command;

/// Default per-call timeout for worker agent HTTP requests.
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised by an [`AgentClient`] call. These map directly onto the
/// three non-fatal error kinds the controller distinguishes: a transport
/// failure marks a worker `failed`; a rejection marks it
/// `app_failed_worker_running`; a remote-exec failure aborts the in-flight
/// action (deploy/remove) without touching the registry.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The agent could not be reached at all (timeout, connection refused, DNS).
    #[error("transport error talking to agent at {host}: {source}")]
    Transport {
        host: String,
        #[source]
        source: reqwest::Error,
    },

    /// The agent responded with a non-success status code.
    #[error("agent at {host} rejected request with status {status}")]
    Rejected { host: String, status: u16 },

    /// A remote shell step (scp/ssh) exited non-zero.
    #[error("remote step `{step}` on {host} failed: {stderr}")]
    Remote {
        host: String,
        step: &'static str,
        stderr: String,
    },
}

/// Response body of `GET /status` on a worker agent.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub worker_name: String,
    pub status: WorkerStatus,
    pub memory_usage: f64,
    pub cpu_usage: f64,
}

/// The operations the controller and poller need from a worker agent.
///
/// Defined as a trait (rather than calling `HttpAgentClient` directly) so
/// tests can substitute a scripted fake without a network.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// `GET /status` on the agent at `host`.
    async fn status(&self, host: &str) -> Result<StatusResponse, AgentError>;

    /// `POST /start_app` on the agent at `host`.
    async fn start_app(&self, host: &str) -> Result<(), AgentError>;

    /// `POST /stop_app` on the agent at `host`.
    async fn stop_app(&self, host: &str) -> Result<(), AgentError>;

    /// Copy `deploy_worker.sh` to `host`, make it executable, and run it
    /// with `worker_name` so it brings up a worker agent (and its
    /// application container) bound to this fleet's configuration.
    async fn deploy(&self, host: &str, worker_name: &str) -> Result<(), AgentError>;

    /// Force-remove the application/worker container left on `host` after
    /// the agent has already been told to stop (`stop_app` must be called
    /// first by the caller; this is the second, destructive step).
    async fn remove_container(&self, host: &str, worker_name: &str) -> Result<(), AgentError>;
}

/// Agent client backed by real HTTP calls (status/start_app/stop_app) and
/// real subprocesses (deploy/remove_container via `scp`/`ssh`).
pub struct HttpAgentClient {
    http: reqwest::Client,
    ssh_user: String,
    worker_info: WorkerInfo,
    app_info: AppInfo,
    remote_timeout: Duration,
}

impl HttpAgentClient {
    /// Build a client around a shared [`reqwest::Client`]. The caller
    /// constructs `http` once (with [`DEFAULT_AGENT_TIMEOUT`] or similar)
    /// and passes it in — this client never builds its own.
    pub fn new(
        http: reqwest::Client,
        ssh_user: impl Into<String>,
        worker_info: WorkerInfo,
        app_info: AppInfo,
        remote_timeout: Duration,
    ) -> Self {
        HttpAgentClient {
            http,
            ssh_user: ssh_user.into(),
            worker_info,
            app_info,
            remote_timeout,
        }
    }

    fn agent_url(&self, host: &str, path: &str) -> String {
        format!("http://{host}:{port}{path}", port = self.worker_info.port)
    }

    fn credentials(&self, host: &str) -> String {
        format!("{}@{host}", self.ssh_user)
    }

    async fn run_remote(
        &self,
        host: &str,
        step: &'static str,
        mut command: Command,
    ) -> Result<(), AgentError> {
        let output = tokio::time::timeout(self.remote_timeout, command.output())
            .await
            .map_err(|_| AgentError::Remote {
                host: host.to_string(),
                step,
                stderr: "timed out".to_string(),
            })?
            .map_err(|err| AgentError::Remote {
                host: host.to_string(),
                step,
                stderr: err.to_string(),
            })?;
        if !output.status.success() {
            return Err(AgentError::Remote {
                host: host.to_string(),
                step,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn status(&self, host: &str) -> Result<StatusResponse, AgentError> {
        let url = self.agent_url(host, "/status");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| AgentError::Transport {
                host: host.to_string(),
                source,
            })?;
        if response.status() != StatusCode::OK {
            return Err(AgentError::Rejected {
                host: host.to_string(),
                status: response.status().as_u16(),
            });
        }
        response
            .json::<StatusResponse>()
            .await
            .map_err(|source| AgentError::Transport {
                host: host.to_string(),
                source,
            })
    }

    async fn start_app(&self, host: &str) -> Result<(), AgentError> {
        let url = self.agent_url(host, "/start_app");
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|source| AgentError::Transport {
                host: host.to_string(),
                source,
            })?;
        if response.status() != StatusCode::OK {
            return Err(AgentError::Rejected {
                host: host.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn stop_app(&self, host: &str) -> Result<(), AgentError> {
        let url = self.agent_url(host, "/stop_app");
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|source| AgentError::Transport {
                host: host.to_string(),
                source,
            })?;
        if response.status() != StatusCode::OK {
            return Err(AgentError::Rejected {
                host: host.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn deploy(&self, host: &str, worker_name: &str) -> Result<(), AgentError> {
        let credentials = self.credentials(host);

        let mut scp = Command::new("scp");
        scp.arg("./deploy_worker.sh")
            .arg(format!("{credentials}:./deploy_worker.sh"));
        self.run_remote(host, "scp deploy_worker.sh", scp).await?;

        let mut chmod = Command::new("ssh");
        chmod
            .arg(&credentials)
            .arg("chmod")
            .arg("+x")
            .arg("./deploy_worker.sh");
        self.run_remote(host, "chmod +x deploy_worker.sh", chmod).await?;

        let mut run = Command::new("ssh");
        run.arg(&credentials)
            .arg("./deploy_worker.sh")
            .arg(&self.worker_info.git_repo)
            .arg(worker_name)
            .arg(self.worker_info.port.to_string())
            .arg(&self.app_info.image)
            .arg(&self.app_info.git_repo)
            .arg(self.app_info.app_port.to_string())
            .arg(&self.app_info.healthcheck)
            .arg(&self.app_info.dockerfile)
            .arg(&self.worker_info.dockerfile);
        self.run_remote(host, "run deploy_worker.sh", run).await
    }

    async fn remove_container(&self, host: &str, worker_name: &str) -> Result<(), AgentError> {
        let credentials = self.credentials(host);
        let mut rm = Command::new("ssh");
        rm.arg(&credentials)
            .arg("docker")
            .arg("rm")
            .arg("-f")
            .arg(worker_name);
        self.run_remote(host, "docker rm -f", rm).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_against(base: &str) -> HttpAgentClient {
        let host_port: Vec<&str> = base.trim_start_matches("http://").split(':').collect();
        HttpAgentClient::new(
            reqwest::Client::new(),
            "deployer",
            WorkerInfo {
                port: host_port[1].parse().unwrap(),
                git_repo: "git@example.com:worker.git".into(),
                dockerfile: "Dockerfile".into(),
            },
            AppInfo {
                image: "app:latest".into(),
                app_port: 8080,
                healthcheck: "/healthz".into(),
                git_repo: "git@example.com:app.git".into(),
                dockerfile: "Dockerfile".into(),
            },
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn status_parses_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "worker_name": "worker-a",
                "status": "healthy",
                "memory_usage": 12.5,
                "cpu_usage": 3.0,
            })))
            .mount(&server)
            .await;

        let client = client_against(server.uri().as_str());
        let host = server.uri().trim_start_matches("http://").split(':').next().unwrap();
        let status = client.status(host).await.unwrap();
        assert_eq!(status.status, WorkerStatus::Healthy);
        assert_eq!(status.memory_usage, 12.5);
    }

    #[tokio::test]
    async fn status_maps_non_success_to_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_against(server.uri().as_str());
        let host = server.uri().trim_start_matches("http://").split(':').next().unwrap();
        let err = client.status(host).await.unwrap_err();
        assert!(matches!(err, AgentError::Rejected { status: 503, .. }));
    }

    #[tokio::test]
    async fn start_app_succeeds_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/start_app"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_against(server.uri().as_str());
        let host = server.uri().trim_start_matches("http://").split(':').next().unwrap();
        client.start_app(host).await.unwrap();
    }
}
