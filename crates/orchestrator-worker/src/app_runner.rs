//! Minimal `docker`-shelling runtime for the one application container a
//! worker agent owns.
//!
//! This intentionally does not rebuild the application image from
//! `app_git_repo`/`app_dockerfile` on every start — per `SPEC_FULL.md` §4.6
//! that image-build workflow is out of scope; `app_image` is assumed to
//! already resolve (pulled or pre-built by `deploy_worker.sh`).

use std::time::Duration;

use tokio::process::Command;

/// Errors from shelling out to `docker` or probing the application over HTTP.
#[derive(Debug, thiserror::Error)]
pub enum AppRunnerError {
    #[error("docker {step} failed: {stderr}")]
    Docker { step: &'static str, stderr: String },
}

/// Configuration the worker agent needs to manage its one application
/// container, read from its environment at startup.
#[derive(Debug, Clone)]
pub struct AppRunnerConfig {
    /// Container name — this implementation uses the worker's own name
    /// rather than the app image (the original names the container after
    /// the image, which collides if two workers ever shared one host;
    /// since each worker owns exactly one container this is simpler and
    /// still unique).
    pub worker_name: String,
    pub app_image: String,
    pub app_port: u16,
    /// Empty string means "no HTTP healthcheck — fall back straight to
    /// container-running" (the original allows `healthcheck_api` to be unset).
    pub healthcheck_api: String,
}

pub struct AppRunner {
    config: AppRunnerConfig,
    http: reqwest::Client,
}

impl AppRunner {
    pub fn new(config: AppRunnerConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client builder should not fail with no custom TLS config");
        AppRunner { config, http }
    }

    /// Stop and remove any existing container under this name, then run a
    /// fresh one from `app_image`.
    pub async fn start(&self) -> Result<(), AppRunnerError> {
        tracing::info!(container = %self.config.worker_name, "starting the app");
        let _ = self.run_docker("stop", &["stop", &self.config.worker_name]).await;
        let _ = self.run_docker("rm", &["rm", &self.config.worker_name]).await;

        let port_mapping = format!("{}:{}", self.config.app_port, self.config.app_port);
        self.run_docker(
            "run",
            &[
                "run",
                "-d",
                "--name",
                &self.config.worker_name,
                "-p",
                &port_mapping,
                &self.config.app_image,
            ],
        )
        .await
    }

    /// Stop the container if it's running. Not finding one is not an error.
    pub async fn stop(&self) -> Result<(), AppRunnerError> {
        tracing::info!(container = %self.config.worker_name, "stopping the app container");
        self.run_docker("stop", &["stop", &self.config.worker_name]).await
    }

    /// Healthcheck first (if configured), falling back to "is the
    /// container running" — exactly the two-tier check the original
    /// `AppRunner.get_status` performs.
    pub async fn status(&self) -> bool {
        if !self.config.healthcheck_api.is_empty() {
            let url = format!("http://localhost:{}{}", self.config.app_port, self.config.healthcheck_api);
            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => return true,
                _ => {}
            }
        }
        self.is_container_running().await
    }

    async fn is_container_running(&self) -> bool {
        let output = Command::new("docker")
            .args(["inspect", "-f", "{{.State.Running}}", &self.config.worker_name])
            .output()
            .await;
        matches!(output, Ok(out) if out.status.success() && String::from_utf8_lossy(&out.stdout).trim() == "true")
    }

    /// `docker stats --no-stream`-derived usage, as percentages. Returns
    /// `(memory_usage, cpu_usage)`, both `0.0` if the container isn't running
    /// or the stats call fails.
    pub async fn usage(&self) -> (f64, f64) {
        let output = Command::new("docker")
            .args([
                "stats",
                "--no-stream",
                "--format",
                "{{.MemPerc}} {{.CPUPerc}}",
                &self.config.worker_name,
            ])
            .output()
            .await;
        let Ok(output) = output else {
            return (0.0, 0.0);
        };
        if !output.status.success() {
            return (0.0, 0.0);
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let mut parts = text.split_whitespace();
        let mem = parts.next().and_then(parse_percent).unwrap_or(0.0);
        let cpu = parts.next().and_then(parse_percent).unwrap_or(0.0);
        (mem, cpu)
    }

    async fn run_docker(&self, step: &'static str, args: &[&str]) -> Result<(), AppRunnerError> {
        let output = Command::new("docker")
            .args(args)
            .output()
            .await
            .map_err(|err| AppRunnerError::Docker {
                step,
                stderr: err.to_string(),
            })?;
        if !output.status.success() {
            return Err(AppRunnerError::Docker {
                step,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

fn parse_percent(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches('%').parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_percent_strips_suffix() {
        assert_eq!(parse_percent("12.34%"), Some(12.34));
        assert_eq!(parse_percent("0.00%"), Some(0.0));
        assert_eq!(parse_percent("garbage"), None);
    }
}
