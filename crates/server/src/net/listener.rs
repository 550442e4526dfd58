use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;

use super::{router, AppState};
use crate::hub::Hub;
use crate::rate_limit::RateLimiter;

/// Bind the configured address and serve HTTP and WebSocket traffic until
/// the listener fails.
pub async fn run(hub: Arc<Hub>) -> anyhow::Result<()> {
    let bind_addr = hub.config().bind.clone();
    let limiter = RateLimiter::new(Duration::from_millis(hub.config().snapshot_interval_ms));
    let app = router(AppState {
        hub,
        limiter: Arc::new(limiter),
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("HTTP server")
}
