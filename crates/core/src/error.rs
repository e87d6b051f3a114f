// crates/core/src/error.rs
//! Errors surfaced synchronously by the job core.
//!
//! Failures that happen *inside* a running job (spawn failure, non-zero
//! exit, timeout, parse failure) are never returned as errors — they are
//! recorded on the job record and discovered on retrieval.

use thiserror::Error;

/// Error type for submission and retrieval calls.
#[derive(Debug, Error)]
pub enum JobError {
    /// Malformed request — no job was created.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Unknown job id. Indistinguishable from a job that never existed.
    #[error("job not found: {0}")]
    NotFound(String),

    /// Admission rejected: the concurrency cap is reached. Jobs are
    /// rejected, not queued; retry is a fresh submission.
    #[error("maximum concurrent jobs ({0}) reached")]
    Capacity(usize),

    /// Internal invariant failure (e.g. a poisoned lock).
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, JobError>;
