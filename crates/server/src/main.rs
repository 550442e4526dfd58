use std::sync::Arc;

use blockworld_server::config::ServerConfig;
use blockworld_server::hub::Hub;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = ServerConfig::from_args(&args)?;

    tracing::info!(
        "blockworld server: seed {}, view distance {}, snapshot interval {} ms",
        config.seed,
        config.view_distance,
        config.snapshot_interval_ms
    );

    let hub = Arc::new(Hub::new(config));

    // ── Serve until ctrl-c ───────────────────────────────────────────────
    tokio::select! {
        result = blockworld_server::net::listener::run(Arc::clone(&hub)) => {
            if let Err(e) = result {
                tracing::error!("Server error: {:#}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down...");
        }
    }

    let stats = hub.stats();
    tracing::info!(
        "Served {} connections, applied {} block updates, {} blocks in overlay",
        stats.connections_total,
        stats.block_updates_applied,
        stats.overlay_blocks
    );
    Ok(())
}
