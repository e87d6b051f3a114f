// crates/server/src/state.rs
//! Shared application state.
//!
//! The runner (registry + admission gate) is constructed once at process
//! start and injected here; handlers never reach for globals.

use std::sync::Arc;

use toolhost_core::JobRunner;

pub struct AppState {
    pub runner: Arc<JobRunner>,
}

impl AppState {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        Self { runner }
    }
}
