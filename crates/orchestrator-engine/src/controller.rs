//! The scale/heal decision engine: one pass over the registry per poller
//! tick, followed by min/max enforcement.

use std::sync::Arc;

use orchestrator_core::config::WorkerLimits;
use orchestrator_core::WorkerRecord;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::agent_client::AgentClient;
use crate::registry::WorkerRegistry;

/// Runs the controller algorithm against a registry and agent client.
///
/// All mutating remote operations (deploy, start/stop, remove) are
/// serialized behind a single coarse lock — `spec.md`'s default, chosen
/// over a per-host lock for this fleet's scale.
pub struct Controller {
    registry: Arc<WorkerRegistry>,
    agent: Arc<dyn AgentClient>,
    limits: WorkerLimits,
    virtual_machines: Vec<String>,
    operation_lock: Mutex<()>,
}

impl Controller {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        agent: Arc<dyn AgentClient>,
        limits: WorkerLimits,
        virtual_machines: Vec<String>,
    ) -> Self {
        Controller {
            registry,
            agent,
            limits,
            virtual_machines,
            operation_lock: Mutex::new(()),
        }
    }

    /// Run one pass of the control algorithm.
    ///
    /// Mirrors `check_and_scale_workers` faithfully, including its one
    /// quirk: a worker healed via `start_app` is *not* skipped by the
    /// resource-usage check that follows — it falls straight through and
    /// is counted toward `healthy_workers` using its last-observed (stale)
    /// usage figures, same as the original.
    ///
    /// Every remote action (heal, deploy, remove, restart) absorbs its own
    /// failure: it's logged and the tick moves on to the next worker. One
    /// worker's failed remote call never aborts observation or control for
    /// any other worker, and never aborts the tick itself — `tick()` only
    /// returns `Err` for a bug in the control loop, not a remote failure.
    pub async fn tick(&self) -> anyhow::Result<()> {
        let mut healthy_workers = 0usize;

        for record in self.registry.snapshot() {
            if !record.status.is_healthy() {
                if record.status.is_app_failed_worker_running() {
                    self.start_app(&record.name, &record.host).await;
                } else {
                    tracing::warn!(worker = %record.name, "worker is not healthy, restarting");
                    self.restart_worker(&record.name).await;
                    continue;
                }
            }

            healthy_workers += 1;
            if record.memory_usage >= self.limits.memory_limit
                || record.cpu_usage >= self.limits.cpu_limit
            {
                tracing::info!(worker = %record.name, "worker reached resource limits, deploying replacement");
                if let Some(vm) = self.discover_free_vm() {
                    self.deploy_worker(&vm).await;
                }
            }
        }

        let min_workers = self.limits.min_workers;
        let max_workers = self.limits.max_workers;
        if healthy_workers < min_workers {
            tracing::warn!(healthy_workers, min_workers, "not enough healthy workers");
            for _ in 0..(min_workers - healthy_workers) {
                match self.discover_free_vm() {
                    Some(vm) => self.deploy_worker(&vm).await,
                    None => break,
                }
            }
        } else if healthy_workers > max_workers {
            tracing::warn!(healthy_workers, max_workers, "too many healthy workers");
            for _ in 0..(healthy_workers - max_workers) {
                match self.select_healthy_worker_to_remove() {
                    Some(name) => self.remove_worker(&name).await,
                    None => break,
                }
            }
        } else {
            tracing::info!(healthy_workers, "healthy workers within limits");
        }

        Ok(())
    }

    /// First configured VM not currently occupied by a worker.
    fn discover_free_vm(&self) -> Option<String> {
        let occupied = self.registry.occupied_hosts();
        self.virtual_machines
            .iter()
            .find(|vm| !occupied.contains(vm))
            .cloned()
    }

    /// First healthy worker in registry iteration order.
    fn select_healthy_worker_to_remove(&self) -> Option<String> {
        self.registry
            .snapshot()
            .into_iter()
            .find(|r| r.status.is_healthy())
            .map(|r| r.name)
    }

    /// Heal a recoverable worker. A failed `start_app` is logged, not
    /// propagated — the next tick re-observes this worker's real status and
    /// retries.
    async fn start_app(&self, worker_name: &str, host: &str) {
        let result = {
            let _guard = self.operation_lock.lock().await;
            self.agent.start_app(host).await
        };
        match result {
            Ok(()) => self.upsert_host(worker_name, host),
            Err(err) => {
                tracing::error!(worker = worker_name, host, error = %err, "failed to start app")
            }
        }
    }

    /// Record that `worker_name` is running on `host`. Uses a single
    /// `patch` rather than a `get`-then-`put` so a concurrent status
    /// refresh (e.g. the HTTP API's force-refresh) can never be clobbered
    /// by a stale copy read before this call started. Only falls back to
    /// `put` when no record exists yet — true for a freshly deployed
    /// worker, which nothing else in the system knows about yet.
    fn upsert_host(&self, worker_name: &str, host: &str) {
        let existed = self.registry.patch(worker_name, |r| r.host = host.to_string());
        if !existed {
            self.registry.put(WorkerRecord::new(worker_name, host));
        }
    }

    /// Deploy a brand-new worker to `host` and record it once the agent
    /// confirms it started. Both the deploy and the follow-up `start_app`
    /// absorb and log their own failures; neither aborts the tick.
    async fn deploy_worker(&self, host: &str) {
        let worker_name = format!("worker-{}", Uuid::new_v4());
        let deployed = {
            let _guard = self.operation_lock.lock().await;
            self.agent.deploy(host, &worker_name).await
        };
        match deployed {
            Ok(()) => self.start_app(&worker_name, host).await,
            Err(err) => {
                tracing::error!(worker = %worker_name, host, error = %err, "failed to deploy worker")
            }
        }
    }

    /// Stop the application then force-remove its container. A failure in
    /// either remote step is logged and the registry entry is left in
    /// place — the next tick re-observes this worker and tries again.
    async fn remove_worker(&self, worker_name: &str) {
        let Some(record) = self.registry.get(worker_name) else {
            tracing::warn!(worker = worker_name, "worker not found for removal");
            return;
        };
        let result = {
            let _guard = self.operation_lock.lock().await;
            match self.agent.stop_app(&record.host).await {
                Ok(()) => self.agent.remove_container(&record.host, worker_name).await,
                Err(err) => Err(err),
            }
        };
        match result {
            Ok(()) => {
                self.registry.delete(worker_name);
            }
            Err(err) => {
                tracing::error!(worker = worker_name, host = %record.host, error = %err, "failed to remove worker")
            }
        }
    }

    /// Remove the worker, then redeploy to the same host under the same
    /// name. Does not call `start_app` afterward and does not re-insert a
    /// registry record — this matches the original's actual behavior (see
    /// `SPEC_FULL.md` §9); the next poll tick only resumes watching this
    /// worker if something re-adds it to the registry. A failed redeploy
    /// is logged, not propagated.
    async fn restart_worker(&self, worker_name: &str) {
        let Some(record) = self.registry.get(worker_name) else {
            return;
        };
        self.remove_worker(worker_name).await;
        let _guard = self.operation_lock.lock().await;
        if let Err(err) = self.agent.deploy(&record.host, worker_name).await {
            tracing::error!(worker = worker_name, host = %record.host, error = %err, "failed to redeploy worker");
        }
    }
}
