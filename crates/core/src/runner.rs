// crates/core/src/runner.rs
//! The job runner: submission, cancellation and shutdown.
//!
//! One `JobRunner` per process, built at startup and injected into the
//! dispatch layer. Submission is non-blocking: it admits, registers and
//! spawns the worker, then returns the job snapshot immediately.
//! Completion is discovered via retrieval (or the polling `wait` helper).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::admission::AdmissionController;
use crate::config::RunnerConfig;
use crate::error::{JobError, Result};
use crate::job::{CommandDescriptor, Job, JobId, JobKind};
use crate::registry::JobRegistry;
use crate::worker;

/// Poll interval for `wait` and `shutdown`.
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long `shutdown` waits for cancelled jobs to reach terminal states.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct JobRunner {
    registry: Arc<JobRegistry>,
    admission: AdmissionController,
    config: RunnerConfig,
    cancels: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
}

impl JobRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new(config.max_history)),
            admission: AdmissionController::new(config.max_concurrent),
            config,
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn max_concurrent(&self) -> usize {
        self.admission.max_concurrent()
    }

    pub fn available_slots(&self) -> usize {
        self.admission.available()
    }

    /// Submit a job: validate, reserve a concurrency slot, register the job
    /// and spawn its worker. Returns the `running` snapshot immediately.
    ///
    /// Fails synchronously with `Validation` (malformed request, no job
    /// created) or `Capacity` (admission rejected, no job created).
    pub fn submit(&self, kind: JobKind, command: CommandDescriptor) -> Result<Job> {
        validate(&command)?;
        let permit = self.admission.try_acquire()?;
        let job = self.registry.create(kind, command.clone())?;

        let token = CancellationToken::new();
        if let Ok(mut cancels) = self.cancels.lock() {
            cancels.insert(job.id.clone(), token.clone());
        }

        let registry = Arc::clone(&self.registry);
        let config = self.config.clone();
        let cancels = Arc::clone(&self.cancels);
        let job_id = job.id.clone();
        tokio::spawn(async move {
            worker::run_job(
                registry,
                config,
                job_id.clone(),
                kind,
                command,
                permit,
                token,
            )
            .await;
            if let Ok(mut cancels) = cancels.lock() {
                cancels.remove(&job_id);
            }
        });

        tracing::info!(job_id = %job.id, kind = kind.as_str(), "job submitted");
        Ok(job)
    }

    /// Request cancellation of a running job. Idempotent: cancelling a job
    /// that already reached a terminal state is a no-op.
    pub fn cancel(&self, id: &str) -> Result<()> {
        let job = self.registry.get(id)?;
        if job.is_terminal() {
            return Ok(());
        }
        let token = self
            .cancels
            .lock()
            .ok()
            .and_then(|c| c.get(id).cloned());
        if let Some(token) = token {
            token.cancel();
        }
        Ok(())
    }

    /// Convenience wrapper: poll until the job reaches a terminal state or
    /// `max_wait` elapses, returning the latest snapshot either way.
    pub async fn wait(&self, id: &str, max_wait: Duration) -> Result<Job> {
        let deadline = tokio::time::Instant::now() + max_wait;
        loop {
            let job = self.registry.get(id)?;
            if job.is_terminal() || tokio::time::Instant::now() >= deadline {
                return Ok(job);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Cancel every running job and wait (bounded) for workers to finish
    /// terminating their processes. Called on process shutdown.
    pub async fn shutdown(&self) {
        let tokens: Vec<CancellationToken> = match self.cancels.lock() {
            Ok(cancels) => cancels.values().cloned().collect(),
            Err(e) => {
                tracing::error!(error = %e, "cancellation map poisoned during shutdown");
                return;
            }
        };
        if tokens.is_empty() {
            return;
        }
        tracing::info!(running = tokens.len(), "shutting down: cancelling running jobs");
        for token in tokens {
            token.cancel();
        }

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while self.registry.running_count() > 0 {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    still_running = self.registry.running_count(),
                    "shutdown grace period elapsed with jobs still running"
                );
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

fn validate(command: &CommandDescriptor) -> Result<()> {
    if command.program.trim().is_empty() {
        return Err(JobError::Validation("command must not be empty".into()));
    }
    if command.timeout_secs == Some(0) {
        return Err(JobError::Validation(
            "timeout_seconds must be greater than zero".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_rejects_empty_command() {
        let runner = JobRunner::new(RunnerConfig::default());
        let err = runner
            .submit(JobKind::UrlArchive, CommandDescriptor::new("  "))
            .unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
        // No job was created.
        assert!(runner.registry().list_all(None).is_empty());
    }

    #[tokio::test]
    async fn test_submit_rejects_zero_timeout() {
        let runner = JobRunner::new(RunnerConfig::default());
        let err = runner
            .submit(
                JobKind::UrlArchive,
                CommandDescriptor::new("true").timeout_secs(0),
            )
            .unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancel_unknown_id_is_not_found() {
        let runner = JobRunner::new(RunnerConfig::default());
        assert!(matches!(
            runner.cancel("deadbeef"),
            Err(JobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_on_unknown_id_is_not_found() {
        let runner = JobRunner::new(RunnerConfig::default());
        let err = runner
            .wait("deadbeef", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::NotFound(_)));
    }
}
