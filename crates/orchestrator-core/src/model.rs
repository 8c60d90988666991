//! The worker record and its status enum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health state of a worker as last observed by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// The agent responded and its application healthcheck passed.
    Healthy,
    /// The agent responded but its application healthcheck failed.
    AppFailedWorkerRunning,
    /// The agent could not be reached (timeout, connection refused, transport error).
    Failed,
    /// No observation has been recorded yet (freshly deployed, pre-bootstrap).
    Unknown,
}

impl WorkerStatus {
    /// Whether this status is recoverable by calling `start_app` rather than a full redeploy.
    pub fn is_app_failed_worker_running(self) -> bool {
        matches!(self, WorkerStatus::AppFailedWorkerRunning)
    }

    /// Whether this worker currently counts toward the healthy-instance total.
    pub fn is_healthy(self) -> bool {
        matches!(self, WorkerStatus::Healthy)
    }
}

/// One entry in the worker registry: everything the master knows about a
/// worker agent running on a particular VM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    /// Unique worker name, e.g. `worker-<uuid>`. Assigned at deploy time.
    pub name: String,
    /// VM hostname this worker's agent is bound to. One worker per host.
    pub host: String,
    /// Last observed health status.
    pub status: WorkerStatus,
    /// Last observed application memory usage, percent of the agent's memory limit.
    pub memory_usage: f64,
    /// Last observed application CPU usage, percent of a single core.
    pub cpu_usage: f64,
    /// Timestamp of the last successful or failed observation.
    pub last_seen: DateTime<Utc>,
}

impl WorkerRecord {
    /// Construct a freshly-deployed record with unknown status, observed now.
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        WorkerRecord {
            name: name.into(),
            host: host.into(),
            status: WorkerStatus::Unknown,
            memory_usage: 0.0,
            cpu_usage: 0.0,
            last_seen: Utc::now(),
        }
    }
}
