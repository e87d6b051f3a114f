// crates/server/src/routes/mod.rs
//! Route assembly.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod health;
pub mod jobs;

/// Build the full application router.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api", jobs::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
