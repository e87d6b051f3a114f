// crates/core/src/retrieval.rs
//! Read path over the registry: windowed reports and listings.
//!
//! Retrieval never mutates a job. Window limits apply to the returned
//! view only; statistics are always computed over the full stored result,
//! so `stats.total` can exceed the number of items in the window.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::derived::DerivedResult;
use crate::error::Result;
use crate::job::{Job, JobId, JobKind, JobStatus};
use crate::runner::JobRunner;
use crate::stats::{analyze_urls, UrlStats};

/// Options for a windowed read of a possibly large derived result.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultWindow {
    /// Return at most the first `limit` items of the derived result.
    pub limit: Option<usize>,
}

/// Full report for one job, with an optionally windowed result view.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub truncated: bool,
    pub stdout_preview: String,
    pub stderr_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Item count of the full stored result, not the window.
    pub total_items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<UrlStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DerivedResult>,
}

/// Listing entry for historical jobs.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Listing entry for currently running jobs.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveJob {
    pub job_id: JobId,
    pub kind: JobKind,
    pub started_at: DateTime<Utc>,
}

impl JobRunner {
    /// Windowed report for one job. Unknown id is `NotFound`, never a
    /// default value. Side-effect-free: repeated calls with different
    /// windows are consistent.
    pub fn get_results(&self, id: &str, window: ResultWindow) -> Result<JobReport> {
        let job = self.registry().get(id)?;
        Ok(self.report(job, window))
    }

    /// Currently running jobs with their start times, insertion order.
    pub fn list_active(&self) -> Vec<ActiveJob> {
        self.registry()
            .list_active()
            .into_iter()
            .map(|j| ActiveJob {
                job_id: j.id,
                kind: j.kind,
                started_at: j.started_at,
            })
            .collect()
    }

    /// All retained jobs, insertion order, optionally filtered by status.
    pub fn list_all(&self, filter: Option<JobStatus>) -> Vec<JobSummary> {
        self.registry()
            .list_all(filter)
            .into_iter()
            .map(summary)
            .collect()
    }

    pub fn list_completed(&self) -> Vec<JobSummary> {
        self.list_all(Some(JobStatus::Completed))
    }

    fn report(&self, job: Job, window: ResultWindow) -> JobReport {
        let preview_cap = self.config().max_artifact_preview;
        let stats = match &job.derived {
            Some(DerivedResult::UrlCorpus { urls }) => Some(analyze_urls(urls)),
            _ => None,
        };
        let total_items = job.derived.as_ref().map_or(0, DerivedResult::item_count);
        let result = job.derived.as_ref().map(|d| d.windowed(window.limit));

        JobReport {
            job_id: job.id,
            kind: job.kind,
            status: job.status,
            submitted_at: job.submitted_at,
            started_at: job.started_at,
            ended_at: job.ended_at,
            exit_code: job.exit_code,
            truncated: job.stdout.truncated || job.stderr.truncated,
            stdout_preview: preview(&job.stdout.text, preview_cap),
            stderr_preview: preview(&job.stderr.text, preview_cap),
            error: job.error_detail,
            total_items,
            stats,
            result,
        }
    }
}

fn summary(job: Job) -> JobSummary {
    JobSummary {
        job_id: job.id,
        kind: job.kind,
        status: job.status,
        submitted_at: job.submitted_at,
        ended_at: job.ended_at,
        exit_code: job.exit_code,
        error: job.error_detail,
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("\n...(truncated)...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_preview_caps_long_text() {
        let text = "a".repeat(50);
        let p = preview(&text, 10);
        assert!(p.starts_with("aaaaaaaaaa"));
        assert!(p.ends_with("...(truncated)..."));
        assert_eq!(preview("short", 10), "short");
    }
}
