// crates/server/src/lib.rs
//! HTTP dispatch layer over the toolhost job core.
//!
//! The core consumes normalized run requests and exposes status/listing/
//! result operations; this crate is only the framing around it.

pub mod error;
pub mod routes;
pub mod state;

pub use routes::create_app;
pub use state::AppState;
