//! In-memory worker registry.
//!
//! A single mutex guards the whole map. Callers copy data out (or build the
//! new record) before calling in, and release the lock before doing any
//! network or subprocess I/O — the lock is never held across an `.await` on
//! an agent call.

use std::collections::HashMap;
use std::sync::Mutex;

use orchestrator_core::WorkerRecord;

#[derive(Default)]
struct Inner {
    by_name: HashMap<String, WorkerRecord>,
}

/// The fleet's worker records, keyed by worker name.
pub struct WorkerRegistry {
    inner: Mutex<Inner>,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        WorkerRegistry {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Insert or replace a worker record wholesale.
    pub fn put(&self, record: WorkerRecord) {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner.by_name.insert(record.name.clone(), record);
    }

    /// Apply `patch` to the named worker's record, if it exists. Returns
    /// whether a record was found and patched — callers that need
    /// upsert semantics (create-if-absent) use this to decide whether a
    /// fallback `put` is needed, without a separate, racy `get` first.
    ///
    /// Unlike `put`, `patch` never creates a record for an unknown name — it
    /// is a no-op, logged at `debug`, since every worker this orchestrator
    /// observes was already registered by `put` at deploy/bootstrap time.
    pub fn patch<F>(&self, name: &str, patch: F) -> bool
    where
        F: FnOnce(&mut WorkerRecord),
    {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        match inner.by_name.get_mut(name) {
            Some(record) => {
                patch(record);
                true
            }
            None => {
                tracing::debug!(worker = name, "patch on unknown worker ignored");
                false
            }
        }
    }

    /// Remove a worker record, returning it if present.
    pub fn delete(&self, name: &str) -> Option<WorkerRecord> {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner.by_name.remove(name)
    }

    /// Look up a single record by name.
    pub fn get(&self, name: &str) -> Option<WorkerRecord> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.by_name.get(name).cloned()
    }

    /// A consistent point-in-time copy of every record, for fan-out or for
    /// serving the HTTP API.
    pub fn snapshot(&self) -> Vec<WorkerRecord> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.by_name.values().cloned().collect()
    }

    /// The set of hosts that currently have a worker assigned, used to pick
    /// a free VM for the next deploy.
    pub fn occupied_hosts(&self) -> Vec<String> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.by_name.values().map(|r| r.host.clone()).collect()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry mutex poisoned").by_name.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::WorkerStatus;

    #[test]
    fn put_then_get_round_trips() {
        let registry = WorkerRegistry::new();
        let record = WorkerRecord::new("worker-a", "vm1");
        registry.put(record.clone());
        assert_eq!(registry.get("worker-a"), Some(record));
    }

    #[test]
    fn patch_unknown_worker_is_a_no_op() {
        let registry = WorkerRegistry::new();
        let found = registry.patch("ghost", |r| r.cpu_usage = 99.0);
        assert!(!found);
        assert!(registry.get("ghost").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn patch_known_worker_updates_in_place() {
        let registry = WorkerRegistry::new();
        registry.put(WorkerRecord::new("worker-a", "vm1"));
        let found = registry.patch("worker-a", |r| r.status = WorkerStatus::Healthy);
        assert!(found);
        assert_eq!(registry.get("worker-a").unwrap().status, WorkerStatus::Healthy);
    }

    #[test]
    fn delete_removes_and_returns_record() {
        let registry = WorkerRegistry::new();
        registry.put(WorkerRecord::new("worker-a", "vm1"));
        let removed = registry.delete("worker-a");
        assert!(removed.is_some());
        assert!(registry.is_empty());
        assert!(registry.delete("worker-a").is_none());
    }

    #[test]
    fn occupied_hosts_reflects_current_records() {
        let registry = WorkerRegistry::new();
        registry.put(WorkerRecord::new("worker-a", "vm1"));
        registry.put(WorkerRecord::new("worker-b", "vm2"));
        let mut hosts = registry.occupied_hosts();
        hosts.sort();
        assert_eq!(hosts, vec!["vm1".to_string(), "vm2".to_string()]);
    }

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let registry = WorkerRegistry::new();
        registry.put(WorkerRecord::new("worker-a", "vm1"));
        let snap = registry.snapshot();
        registry.delete("worker-a");
        assert_eq!(snap.len(), 1);
        assert!(registry.is_empty());
    }
}
