// crates/core/src/worker.rs
//! Execution worker: owns the lifecycle of one external process.
//!
//! The process is a scoped resource — spawn, incremental capture, wall-clock
//! timeout, termination and reaping all happen inside `run_job`, and the
//! handle is released on every exit path (`kill_on_drop` backstops the rest).
//! Only time is bounded: a chatty tool gets its output truncated, not killed.

use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::admission::AdmissionPermit;
use crate::config::RunnerConfig;
use crate::derived;
use crate::job::{Capture, CommandDescriptor, JobId, JobKind, JobOutcome, JobStatus};
use crate::registry::JobRegistry;

/// Run one job to its terminal state.
///
/// The admission permit is held for the whole execution and released
/// exactly once when this function returns, whatever the exit path.
pub(crate) async fn run_job(
    registry: Arc<JobRegistry>,
    config: RunnerConfig,
    job_id: JobId,
    kind: JobKind,
    command: CommandDescriptor,
    permit: AdmissionPermit,
    cancel: CancellationToken,
) {
    let outcome = execute(&config, &job_id, kind, &command, &cancel).await;

    if let Some(dir) = &config.output_dir {
        write_artifacts(dir, &job_id, &outcome).await;
    }

    registry.finish(&job_id, outcome);
    drop(permit);
}

enum StopReason {
    Exited(std::process::ExitStatus),
    WaitFailed(std::io::Error),
    TimedOut,
    Cancelled,
}

async fn execute(
    config: &RunnerConfig,
    job_id: &str,
    kind: JobKind,
    command: &CommandDescriptor,
    cancel: &CancellationToken,
) -> JobOutcome {
    let timeout = command
        .timeout_secs
        .map(std::time::Duration::from_secs)
        .unwrap_or(config.default_timeout);

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(if command.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &command.env {
        cmd.env(key, value);
    }
    // Own process group so timeout termination reaches child processes too.
    #[cfg(unix)]
    cmd.process_group(0);

    tracing::info!(
        job_id = %job_id,
        kind = kind.as_str(),
        program = %command.program,
        timeout_secs = timeout.as_secs(),
        "spawning tool process"
    );

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(job_id = %job_id, program = %command.program, error = %e, "failed to spawn");
            return JobOutcome::spawn_error(format!(
                "failed to spawn '{}': {e}",
                command.program
            ));
        }
    };

    // The write runs as its own task so a payload larger than the pipe
    // buffer cannot stall the worker before the deadline is in force. The
    // pipe closes when the task drops the handle; a tool that exits without
    // reading stdin gives a broken pipe, which shows up in its exit status,
    // not here.
    if let Some(payload) = &command.stdin {
        if let Some(mut stdin) = child.stdin.take() {
            let payload = payload.clone();
            let id = job_id.to_string();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                    tracing::debug!(job_id = %id, error = %e, "stdin write failed");
                }
            });
        }
    }

    let (Some(mut stdout_pipe), Some(mut stderr_pipe)) =
        (child.stdout.take(), child.stderr.take())
    else {
        terminate(&mut child).await;
        return JobOutcome::spawn_error("failed to capture process output streams");
    };

    let deadline = Instant::now() + timeout;
    let mut stdout = Capture::default();
    let mut stderr = Capture::default();
    let mut out_buf = [0u8; 8192];
    let mut err_buf = [0u8; 8192];
    let mut stdout_open = true;
    let mut stderr_open = true;

    let reason = loop {
        tokio::select! {
            read = stdout_pipe.read(&mut out_buf), if stdout_open => match read {
                Ok(0) => stdout_open = false,
                Ok(n) => stdout.append(&String::from_utf8_lossy(&out_buf[..n]), config.max_text_output),
                Err(e) => {
                    tracing::debug!(job_id = %job_id, error = %e, "stdout read failed");
                    stdout_open = false;
                }
            },
            read = stderr_pipe.read(&mut err_buf), if stderr_open => match read {
                Ok(0) => stderr_open = false,
                Ok(n) => stderr.append(&String::from_utf8_lossy(&err_buf[..n]), config.max_text_output),
                Err(e) => {
                    tracing::debug!(job_id = %job_id, error = %e, "stderr read failed");
                    stderr_open = false;
                }
            },
            status = child.wait(), if !stdout_open && !stderr_open => break match status {
                Ok(s) => StopReason::Exited(s),
                Err(e) => StopReason::WaitFailed(e),
            },
            _ = tokio::time::sleep_until(deadline) => break StopReason::TimedOut,
            _ = cancel.cancelled() => break StopReason::Cancelled,
        }
    };

    match reason {
        StopReason::Exited(status) => {
            let exit_code = status.code();
            let derived_result =
                derived::parse(kind, &stdout.text, config.max_artifact_preview);
            // The wayback fetcher often exits non-zero after a partial
            // fetch; URLs on stdout still count as a completed run.
            let completed = status.success()
                || (kind == JobKind::UrlArchive && derived_result.is_some());
            if completed {
                JobOutcome {
                    status: JobStatus::Completed,
                    exit_code,
                    stdout,
                    stderr,
                    derived: derived_result,
                    error_detail: None,
                }
            } else {
                let detail = if stderr.is_empty() {
                    format!("process exited with code {exit_code:?}")
                } else {
                    stderr.text.clone()
                };
                JobOutcome {
                    status: JobStatus::Failed,
                    exit_code,
                    stdout,
                    stderr,
                    derived: None,
                    error_detail: Some(detail),
                }
            }
        }
        StopReason::WaitFailed(e) => {
            terminate(&mut child).await;
            JobOutcome {
                status: JobStatus::Error,
                exit_code: None,
                stdout,
                stderr,
                derived: None,
                error_detail: Some(format!("failed to wait for process: {e}")),
            }
        }
        StopReason::TimedOut => {
            tracing::warn!(job_id = %job_id, timeout_secs = timeout.as_secs(), "job timed out, terminating process group");
            terminate(&mut child).await;
            JobOutcome {
                status: JobStatus::Timeout,
                exit_code: None,
                stdout,
                stderr,
                derived: None,
                error_detail: Some(format!(
                    "timed out after {} seconds; process terminated",
                    timeout.as_secs()
                )),
            }
        }
        StopReason::Cancelled => {
            tracing::info!(job_id = %job_id, "job cancelled, terminating process group");
            terminate(&mut child).await;
            JobOutcome {
                status: JobStatus::Error,
                exit_code: None,
                stdout,
                stderr,
                derived: None,
                error_detail: Some("cancelled before completion; process terminated".to_string()),
            }
        }
    }
}

/// Terminate the process (and, on unix, its whole process group) and reap it.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // The child was started in its own group, so its pid is the pgid.
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "kill after terminate failed (already reaped?)");
    }
    // kill() already awaits reaping on success; a second wait is harmless
    // and covers the killpg-only path.
    let _ = child.wait().await;
}

/// Persist captured output under `<output_dir>/<job_id>/`. Best-effort:
/// artifact failures are logged and never change the job's status.
async fn write_artifacts(dir: &std::path::Path, job_id: &str, outcome: &JobOutcome) {
    if outcome.stdout.is_empty() && outcome.stderr.is_empty() {
        return;
    }
    let job_dir = dir.join(job_id);
    if let Err(e) = tokio::fs::create_dir_all(&job_dir).await {
        tracing::warn!(job_id = %job_id, error = %e, "failed to create artifact directory");
        return;
    }
    for (name, capture) in [("stdout.txt", &outcome.stdout), ("stderr.txt", &outcome.stderr)] {
        if capture.is_empty() {
            continue;
        }
        if let Err(e) = tokio::fs::write(job_dir.join(name), &capture.text).await {
            tracing::warn!(job_id = %job_id, artifact = name, error = %e, "failed to write artifact");
        }
    }
}
