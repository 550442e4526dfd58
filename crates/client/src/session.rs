//! Connection driver: connect, bootstrap, exchange messages, reconnect.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::Context;
use blockworld_protocol::ServerMessage;
use futures::future::{FusedFuture, FutureExt};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use crate::bootstrap::{fetch_with_retry, HttpSnapshotSource};
use crate::config::ClientConfig;
use crate::state::ClientState;

/// Owns the transport and shares [`ClientState`] with the render loop.
pub struct Session {
    config: ClientConfig,
    state: Arc<Mutex<ClientState>>,
}

impl Session {
    pub fn new(config: ClientConfig) -> Self {
        let state = Arc::new(Mutex::new(ClientState::new(config.clone())));
        Self { config, state }
    }

    pub fn state(&self) -> Arc<Mutex<ClientState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().expect("client state poisoned")
    }

    /// Stay connected forever. Every lost connection clears the remote
    /// players and forces a fresh bootstrap after the reconnect delay.
    pub async fn run(&self) {
        loop {
            match self.run_connection().await {
                Ok(()) => tracing::info!("Server closed the connection"),
                Err(e) => tracing::warn!("Connection lost: {:#}", e),
            }
            self.lock().on_disconnect();

            let delay = self.config.reconnect_delay();
            tracing::info!("Reconnecting in {} ms", delay.as_millis());
            tokio::time::sleep(delay).await;
        }
    }

    /// One connection from handshake to close. The first snapshot fetch
    /// bootstraps the world; later ones refresh it when the state asks.
    async fn run_connection(&self) -> anyhow::Result<()> {
        let url = self.config.ws_url.as_str();
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .with_context(|| format!("connecting to {url}"))?;
        tracing::info!("Connected to {}", url);
        let (mut sink, mut stream) = ws.split();

        let source = HttpSnapshotSource::new(self.config.snapshot_url());
        let fetch_snapshot = || fetch_with_retry(&source, &self.config.retry).boxed().fuse();
        let mut fetch = fetch_snapshot();
        let mut bootstrapped = false;

        let period = Duration::from_millis(self.config.throttle.min_interval_ms.max(1));
        let mut ticker = tokio::time::interval(period);

        loop {
            tokio::select! {
                snapshot = &mut fetch, if !fetch.is_terminated() => {
                    let mut state = self.lock();
                    match snapshot {
                        Some(snapshot) => state.apply_snapshot(&snapshot),
                        None if bootstrapped => state.abandon_refresh(),
                        None => state.initialize_empty(),
                    }
                    bootstrapped = true;
                    if state.take_refresh_request() {
                        fetch = fetch_snapshot();
                    }
                }

                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => match ServerMessage::decode(&text) {
                            Ok(msg) => self.lock().handle_message(msg),
                            Err(e) => tracing::warn!("Dropping malformed server message: {}", e),
                        },
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Err(e)) => return Err(e).context("reading from server"),
                        Some(Ok(_)) => {} // pings and binary frames
                    }
                }

                _ = ticker.tick() => {
                    let (report, outgoing, refresh) = {
                        let mut state = self.lock();
                        let (report, outgoing) = state.tick(Instant::now());
                        let refresh = fetch.is_terminated() && state.take_refresh_request();
                        (report, outgoing, refresh)
                    };
                    if refresh {
                        tracing::debug!("Refreshing world state after loading new chunks");
                        fetch = fetch_snapshot();
                    }
                    if report.loaded > 0 {
                        tracing::debug!("Loaded {} chunks, unloaded {}", report.loaded, report.unloaded);
                    }
                    for msg in outgoing {
                        sink.send(Message::Text(msg.encode()?))
                            .await
                            .context("sending to server")?;
                    }
                }
            }
        }
    }
}
