//! Master configuration: the `CONFIG_MASTER` JSON file plus the environment
//! variables the orchestrator needs at startup.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Application image and deployment metadata, shared by every worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    /// Docker image the worker agent runs as the application container.
    pub image: String,
    /// TCP port the application listens on inside its container.
    pub app_port: u16,
    /// HTTP path the worker agent probes for application health.
    pub healthcheck: String,
    /// Git repository the application is built from (thin-glue worker agents
    /// may ignore this; `deploy_worker.sh` is the consumer of record).
    pub git_repo: String,
    /// Dockerfile path within `git_repo`.
    pub dockerfile: String,
}

/// Worker-agent image and deployment metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    /// TCP port the worker agent's own HTTP server listens on.
    pub port: u16,
    /// Git repository the worker-agent binary is built from.
    pub git_repo: String,
    /// Dockerfile path within `git_repo`.
    pub dockerfile: String,
}

/// Scaling thresholds enforced by the controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkerLimits {
    /// Minimum number of healthy workers to maintain.
    pub min_workers: usize,
    /// Maximum number of workers to run concurrently.
    pub max_workers: usize,
    /// Memory usage percent above which a healthy worker is considered overloaded.
    pub memory_limit: f64,
    /// CPU usage percent above which a healthy worker is considered overloaded.
    pub cpu_limit: f64,
}

/// The full `CONFIG_MASTER` JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    pub app_info: AppInfo,
    pub worker_info: WorkerInfo,
    pub worker_limits: WorkerLimits,
    pub virtual_machines: Vec<String>,
}

impl MasterConfig {
    /// Load and validate the config file at `path`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: MasterConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?;
        config.validate()?;
        tracing::debug!(path, "master config loaded and validated");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.virtual_machines.is_empty() {
            return Err(ConfigError::Invalid(
                "virtual_machines must not be empty".into(),
            ));
        }
        if self.worker_limits.min_workers > self.worker_limits.max_workers {
            return Err(ConfigError::Invalid(
                "worker_limits.min_workers must not exceed max_workers".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "app_info": {"image": "app:latest", "app_port": 8080, "healthcheck": "/healthz", "git_repo": "git@x:y.git", "dockerfile": "Dockerfile"},
            "worker_info": {"port": 9000, "git_repo": "git@x:worker.git", "dockerfile": "Dockerfile"},
            "worker_limits": {"min_workers": 2, "max_workers": 5, "memory_limit": 80.0, "cpu_limit": 80.0},
            "virtual_machines": ["vm1", "vm2", "vm3"]
        }"#
    }

    #[test]
    fn parses_well_formed_config() {
        let config: MasterConfig = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(config.virtual_machines.len(), 3);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_empty_vm_pool() {
        let mut config: MasterConfig = serde_json::from_str(sample_json()).unwrap();
        config.virtual_machines.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_min_exceeding_max() {
        let mut config: MasterConfig = serde_json::from_str(sample_json()).unwrap();
        config.worker_limits.min_workers = 10;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
