// crates/core/src/registry.rs
//! In-memory job registry.
//!
//! One instance per process, constructed at startup and injected into
//! whatever layer dispatches tool-invocation requests. Insertion order is
//! preserved for listing. Updates go through a single lock, so writes to a
//! given job are serialized; readers get cloned snapshots.
//!
//! Retention is capacity-bounded: terminal jobs beyond `max_history` are
//! evicted oldest-first on insert. Running jobs are never evicted.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use crate::error::{JobError, Result};
use crate::job::{new_job_id, CommandDescriptor, Job, JobId, JobKind, JobOutcome, JobStatus};

pub struct JobRegistry {
    inner: RwLock<Inner>,
    max_history: usize,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    order: Vec<JobId>,
}

impl JobRegistry {
    pub fn new(max_history: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_history: max_history.max(1),
        }
    }

    /// Create a job in `running` state and return a snapshot of it.
    pub fn create(&self, kind: JobKind, command: CommandDescriptor) -> Result<Job> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| JobError::Internal(format!("registry lock poisoned: {e}")))?;

        let mut id = new_job_id();
        while inner.jobs.contains_key(&id) {
            id = new_job_id();
        }

        let job = Job::new(id.clone(), kind, command);
        let snapshot = job.clone();
        inner.jobs.insert(id.clone(), job);
        inner.order.push(id);
        evict_terminal(&mut inner, self.max_history);

        Ok(snapshot)
    }

    /// Snapshot of one job. An evicted job is indistinguishable from one
    /// that never existed.
    pub fn get(&self, id: &str) -> Result<Job> {
        let inner = self
            .inner
            .read()
            .map_err(|e| JobError::Internal(format!("registry lock poisoned: {e}")))?;
        inner
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Snapshots of all running jobs, insertion order.
    pub fn list_active(&self) -> Vec<Job> {
        self.list_all(Some(JobStatus::Running))
    }

    /// Snapshots of all jobs, insertion order, optionally filtered by status.
    pub fn list_all(&self, filter: Option<JobStatus>) -> Vec<Job> {
        let inner = match self.inner.read() {
            Ok(g) => g,
            Err(e) => {
                tracing::error!(error = %e, "registry lock poisoned, returning empty list");
                return Vec::new();
            }
        };
        inner
            .order
            .iter()
            .filter_map(|id| inner.jobs.get(id))
            .filter(|j| filter.map_or(true, |f| j.status == f))
            .cloned()
            .collect()
    }

    /// Number of jobs currently in `running` state.
    pub fn running_count(&self) -> usize {
        self.list_active().len()
    }

    /// Apply a worker's terminal outcome to a job.
    ///
    /// The state machine is one-directional: if the job already reached a
    /// terminal state the outcome is dropped and `false` is returned.
    pub fn finish(&self, id: &str, outcome: JobOutcome) -> bool {
        debug_assert!(outcome.status.is_terminal());
        let mut inner = match self.inner.write() {
            Ok(g) => g,
            Err(e) => {
                tracing::error!(error = %e, job_id = %id, "registry lock poisoned, dropping outcome");
                return false;
            }
        };
        let Some(job) = inner.jobs.get_mut(id) else {
            tracing::warn!(job_id = %id, "finish() for unknown job (evicted?)");
            return false;
        };
        if job.is_terminal() {
            tracing::warn!(
                job_id = %id,
                current = job.status.as_str(),
                dropped = outcome.status.as_str(),
                "ignoring second terminal transition"
            );
            return false;
        }

        job.status = outcome.status;
        job.ended_at = Some(Utc::now());
        job.exit_code = outcome.exit_code;
        job.stdout = outcome.stdout;
        job.stderr = outcome.stderr;
        job.derived = outcome.derived;
        job.error_detail = outcome.error_detail;

        tracing::info!(
            job_id = %id,
            kind = job.kind.as_str(),
            status = job.status.as_str(),
            exit_code = ?job.exit_code,
            "job reached terminal state"
        );
        true
    }
}

fn evict_terminal(inner: &mut Inner, max_history: usize) {
    while inner.order.len() > max_history {
        let Some(pos) = inner
            .order
            .iter()
            .position(|id| inner.jobs.get(id).is_some_and(Job::is_terminal))
        else {
            // Everything retained is still running; nothing safe to evict.
            break;
        };
        let id = inner.order.remove(pos);
        inner.jobs.remove(&id);
        tracing::debug!(job_id = %id, "evicted terminal job beyond history cap");
    }
}
