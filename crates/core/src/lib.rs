// crates/core/src/lib.rs
//! Asynchronous job core for wrapped security CLIs.
//!
//! The recurring pattern behind a family of tool-wrapping servers (URL
//! archive fetching, secret scanning, protocol fuzzing, grammar-based
//! generation, binary analysis): run a long-lived external process, track
//! it by an opaque id, bound how many run at once, enforce a wall-clock
//! timeout, and serve results later without re-running anything.
//!
//! - [`JobRunner`] — submission, cancellation, shutdown
//! - [`JobRegistry`] — in-memory, insertion-ordered job records
//! - [`AdmissionController`] — atomic reject-don't-queue concurrency gate
//! - retrieval — windowed reports, active/historical listings
//! - [`stats`] — order-independent URL corpus summaries
//!
//! The registry is ephemeral: nothing survives a process restart.

pub mod admission;
pub mod config;
pub mod derived;
pub mod error;
pub mod job;
pub mod registry;
pub mod retrieval;
pub mod runner;
pub mod stats;
mod worker;

pub use admission::{AdmissionController, AdmissionPermit};
pub use config::RunnerConfig;
pub use derived::{DerivedResult, SecretFinding};
pub use error::{JobError, Result};
pub use job::{Capture, CommandDescriptor, Job, JobId, JobKind, JobStatus};
pub use registry::JobRegistry;
pub use retrieval::{ActiveJob, JobReport, JobSummary, ResultWindow};
pub use runner::JobRunner;
pub use stats::{analyze_urls, UrlStats};
