// crates/core/src/job.rs
//! The job record and its state machine.
//!
//! A `Job` is one tracked invocation of an external tool. It is created in
//! `Running` state (admission is checked synchronously, there is no queue)
//! and moves exactly once into one of the four terminal states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::derived::DerivedResult;

/// Opaque job identifier, stable for the life of the process.
pub type JobId = String;

/// Generate a new job id: the first 8 hex chars of a v4 UUID.
pub(crate) fn new_job_id() -> JobId {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    hex[..8].to_string()
}

/// Which wrapped tool a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Historical-URL discovery (waybackurls-style, line-per-URL output).
    UrlArchive,
    /// Secret scanning (gitleaks-style, JSON findings on stdout).
    SecretScan,
    /// Network protocol fuzzing (boofuzz-style, free-form log output).
    ProtocolFuzz,
    /// Grammar-based test-case generation (dharma-style, line-per-case).
    GrammarGen,
    /// Binary / contract analysis runners (free-form report output).
    BinaryAnalysis,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::UrlArchive => "url_archive",
            JobKind::SecretScan => "secret_scan",
            JobKind::ProtocolFuzz => "protocol_fuzz",
            JobKind::GrammarGen => "grammar_gen",
            JobKind::BinaryAnalysis => "binary_analysis",
        }
    }
}

/// Job lifecycle status.
///
/// `Running` is the only non-terminal state. Transitions are one-way:
/// `running -> {completed, failed, timeout, error}` and nothing leaves a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Timeout,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
            JobStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "timeout" => Ok(JobStatus::Timeout),
            "error" => Ok(JobStatus::Error),
            _ => Err(()),
        }
    }
}

/// Normalized description of the external process to run.
///
/// Everything needed to reproduce the invocation: executable, arguments,
/// extra environment, an optional stdin payload (waybackurls reads the
/// target domain from stdin) and an optional per-job timeout override.
#[derive(Debug, Clone, Serialize)]
pub struct CommandDescriptor {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl CommandDescriptor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
            timeout_secs: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Bounded text capture of one output stream.
///
/// Appends stop once `max_chars` is reached; excess bytes are discarded and
/// `truncated` records the loss. The process itself is never killed for
/// emitting too much output — only time is bounded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Capture {
    pub text: String,
    pub truncated: bool,
    /// Running char count of `text`, so appends stay O(chunk).
    #[serde(skip)]
    chars: usize,
}

impl Capture {
    pub fn append(&mut self, chunk: &str, max_chars: usize) {
        if self.truncated {
            return;
        }
        let remaining = max_chars.saturating_sub(self.chars);
        let incoming = chunk.chars().count();
        if incoming <= remaining {
            self.text.push_str(chunk);
            self.chars += incoming;
        } else {
            self.text.extend(chunk.chars().take(remaining));
            self.chars = max_chars;
            self.truncated = true;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// One tracked invocation of an external tool.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub command: CommandDescriptor,
    pub stdout: Capture,
    pub stderr: Capture,
    pub exit_code: Option<i32>,
    pub derived: Option<DerivedResult>,
    pub error_detail: Option<String>,
}

impl Job {
    pub(crate) fn new(id: JobId, kind: JobKind, command: CommandDescriptor) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            status: JobStatus::Running,
            submitted_at: now,
            started_at: now,
            ended_at: None,
            command,
            stdout: Capture::default(),
            stderr: Capture::default(),
            exit_code: None,
            derived: None,
            error_detail: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Everything a worker reports when its job reaches a terminal state.
#[derive(Debug)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub stdout: Capture,
    pub stderr: Capture,
    pub derived: Option<DerivedResult>,
    pub error_detail: Option<String>,
}

impl JobOutcome {
    /// Outcome for a process that could not even be spawned. No captures.
    pub fn spawn_error(detail: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            exit_code: None,
            stdout: Capture::default(),
            stderr: Capture::default(),
            derived: None,
            error_detail: Some(detail.into()),
        }
    }
}
