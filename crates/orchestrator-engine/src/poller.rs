//! The poller: bootstrap probe over the configured VM pool, then a
//! steady-state loop that refreshes every worker's status and hands off to
//! the controller.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use orchestrator_core::{WorkerRecord, WorkerStatus};

use crate::agent_client::{AgentClient, AgentError};
use crate::controller::Controller;
use crate::registry::WorkerRegistry;

/// Interval between steady-state status fan-outs.
pub const POLL_INTERVAL: Duration = Duration::from_secs(7);

/// Sleep before restarting the outer loop after an uncaught tick error.
///
/// The original implementation's retry comment says 60 seconds but its
/// code sleeps 15 — this implementation keeps the coded value.
pub const OUTER_RETRY_DELAY: Duration = Duration::from_secs(15);

pub struct Poller {
    registry: Arc<WorkerRegistry>,
    agent: Arc<dyn AgentClient>,
    controller: Arc<Controller>,
    virtual_machines: Vec<String>,
}

impl Poller {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        agent: Arc<dyn AgentClient>,
        controller: Arc<Controller>,
        virtual_machines: Vec<String>,
    ) -> Self {
        Poller {
            registry,
            agent,
            controller,
            virtual_machines,
        }
    }

    /// Run forever: bootstrap, then steady-state tick every
    /// [`POLL_INTERVAL`]. If a tick returns an error the whole cycle
    /// (bootstrap included) restarts after [`OUTER_RETRY_DELAY`].
    pub async fn run(&self) -> ! {
        loop {
            if let Err(err) = self.run_once().await {
                tracing::error!(error = %err, "poller cycle failed, retrying");
                tokio::time::sleep(OUTER_RETRY_DELAY).await;
            }
        }
    }

    async fn run_once(&self) -> anyhow::Result<()> {
        self.bootstrap().await;
        loop {
            self.refresh_all().await;
            self.controller.tick().await?;
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Probe every configured VM directly and seed the registry from
    /// whatever responds. VMs that don't answer (or answer with a garbled
    /// body) are skipped, not retried here — the steady-state loop never
    /// re-probes a VM that isn't already in the registry.
    async fn bootstrap(&self) {
        tracing::info!("bootstrapping worker data");
        for vm in &self.virtual_machines {
            match self.agent.status(vm).await {
                Ok(status) => {
                    let record = WorkerRecord {
                        name: status.worker_name.clone(),
                        host: vm.clone(),
                        status: status.status,
                        memory_usage: status.memory_usage,
                        cpu_usage: status.cpu_usage,
                        last_seen: chrono::Utc::now(),
                    };
                    tracing::info!(worker = %record.name, host = vm, status = ?record.status, "worker initialized");
                    self.registry.put(record);
                }
                Err(err) => {
                    tracing::warn!(host = vm, error = %err, "failed to initialize worker data for VM");
                }
            }
        }
    }

    /// Fan out a status call per currently-registered worker, concurrently,
    /// and apply every result before returning.
    async fn refresh_all(&self) {
        let snapshot = self.registry.snapshot();
        let updates = snapshot
            .iter()
            .map(|record| refresh_worker(&self.registry, self.agent.as_ref(), &record.name, &record.host));
        join_all(updates).await;
    }
}

/// Re-probe one worker's `/status` and fold the result into the registry.
/// Shared between the poller's steady-state loop and the HTTP API's
/// `PUT /workers` force-refresh.
pub async fn refresh_worker(
    registry: &WorkerRegistry,
    agent: &dyn AgentClient,
    name: &str,
    host: &str,
) {
    match agent.status(host).await {
        Ok(status) => {
            tracing::debug!(worker = %name, status = ?status.status, "updated worker status");
            registry.patch(name, |record| {
                record.status = status.status;
                record.memory_usage = status.memory_usage;
                record.cpu_usage = status.cpu_usage;
                record.last_seen = chrono::Utc::now();
            });
        }
        Err(AgentError::Rejected { .. }) => {
            tracing::warn!(worker = %name, "agent rejected status request");
            registry.patch(name, |record| {
                record.status = WorkerStatus::AppFailedWorkerRunning;
                record.last_seen = chrono::Utc::now();
            });
        }
        Err(err) => {
            tracing::error!(worker = %name, error = %err, "error updating worker status");
            registry.patch(name, |record| {
                record.status = WorkerStatus::Failed;
                record.last_seen = chrono::Utc::now();
            });
        }
    }
}
