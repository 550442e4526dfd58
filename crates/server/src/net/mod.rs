//! HTTP and WebSocket surface.
//!
//! `/ws` carries the persistent `{type, data}` connection; the `/api` routes
//! serve the bulk snapshot and diagnostics.

pub mod listener;
pub mod routes;
pub mod socket;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::hub::Hub;
use crate::rate_limit::RateLimiter;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub limiter: Arc<RateLimiter>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(socket::upgrade))
        .route("/api/world-state", get(routes::world_state))
        .route("/api/updates", get(routes::updates))
        .route("/api/stats", get(routes::stats))
        .with_state(state)
}
