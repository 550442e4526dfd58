use std::path::Path;

use blockworld_client::config::ClientConfig;
use blockworld_client::session::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .init();

    let mut config = match flag("--config") {
        Some(path) => ClientConfig::load(Path::new(&path))?,
        None => ClientConfig::default(),
    };
    if let Some(server) = flag("--server") {
        config.http_url = format!("http://{server}");
        config.ws_url = format!("ws://{server}/ws");
    }

    tracing::info!("blockworld client connecting to {}", config.ws_url);
    let session = Session::new(config);

    tokio::select! {
        _ = session.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down...");
        }
    }

    let state = session.state();
    let state = state.lock().expect("client state poisoned");
    tracing::info!(
        "Leaving with {} chunks loaded and {} known edits",
        state.world().chunk_count(),
        state.world().edit_count()
    );
    Ok(())
}

fn flag(name: &str) -> Option<String> {
    std::env::args().skip_while(|a| a != name).nth(1)
}
