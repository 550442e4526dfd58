use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use blockworld_protocol::RateLimited;

use super::AppState;

/// `GET /api/world-state`: the whole overlay, rate limited per client IP.
pub async fn world_state(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(app): State<AppState>,
) -> Response {
    if let Err(wait) = app.limiter.check(addr.ip()) {
        app.hub.metrics.snapshot_rejected();
        let retry_after_ms = wait.as_millis() as u64;
        tracing::debug!("Snapshot request from {} rate limited ({} ms)", addr, retry_after_ms);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_ms.div_ceil(1000).max(1).to_string())],
            Json(RateLimited::new(retry_after_ms)),
        )
            .into_response();
    }

    let snapshot = app.hub.snapshot();
    app.hub.metrics.snapshot_served();
    tracing::debug!("Serving snapshot of {} blocks to {}", snapshot.blocks.len(), addr);
    Json(snapshot).into_response()
}

/// `GET /api/updates`: the bounded update log, oldest first.
pub async fn updates(State(app): State<AppState>) -> impl IntoResponse {
    Json(app.hub.updates())
}

/// `GET /api/stats`: counters snapshot.
pub async fn stats(State(app): State<AppState>) -> impl IntoResponse {
    Json(app.hub.stats())
}
