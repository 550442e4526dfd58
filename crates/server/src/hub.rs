//! Connection hub: connection lifecycle, message handling and fan-out.
//!
//! Every state change goes through one `Mutex<GameState>`, and fan-out to the
//! per-connection queues happens while that lock is held. Handlers therefore
//! run to completion one at a time and every recipient sees mutations in the
//! order they were applied. The lock is never held across an `.await`;
//! delivery uses `try_send`, so a slow socket only loses its own messages.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use blockworld_protocol::{
    BlockEdit, BlockUpdate, ClientMessage, InitialState, PlayerState, ServerMessage, Vec3,
    WorldSnapshot,
};
use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::config::ServerConfig;
use crate::metrics::{Metrics, StatsSnapshot};
use crate::state::GameState;

/// Server-side lifecycle of one persistent connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Registered, initial state not yet sent. Skipped by broadcasts.
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionPhase::Connecting => "CONNECTING",
            ConnectionPhase::Open => "OPEN",
            ConnectionPhase::Closed => "CLOSED",
        })
    }
}

struct Connection {
    addr: Option<SocketAddr>,
    phase: ConnectionPhase,
    tx: mpsc::Sender<ServerMessage>,
}

pub struct Hub {
    config: ServerConfig,
    state: Mutex<GameState>,
    connections: DashMap<u64, Connection>,
    next_id: AtomicU64,
    pub metrics: Metrics,
}

impl Hub {
    pub fn new(config: ServerConfig) -> Self {
        let state = GameState::new(config.update_log_capacity);
        Self {
            config,
            state: Mutex::new(state),
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            metrics: Metrics::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Ignores poisoning. Every `GameState` mutation is a single insert or
    /// remove, so a panicked handler never leaves it half-updated.
    fn lock_state(&self) -> MutexGuard<'_, GameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn(&self) -> Vec3 {
        self.config.spawn.into()
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Open a connection: allocate an id, register the player at spawn,
    /// queue its initial state and announce it to everyone else.
    ///
    /// Returns the id and the receiving end of the connection's outbound
    /// queue.
    pub fn connect(&self, addr: Option<SocketAddr>) -> (u64, mpsc::Receiver<ServerMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.outbound_queue.max(1));
        self.connections.insert(
            id,
            Connection {
                addr,
                phase: ConnectionPhase::Connecting,
                tx,
            },
        );

        let mut state = self.lock_state();
        let record = state.add_player(id, self.spawn()).clone();
        let initial = ServerMessage::InitialState(InitialState {
            player_id: id,
            players: state.players_except(id),
            seed: Some(self.config.seed),
            spawn: self.spawn(),
            timestamp: record.connected_at,
        });
        self.deliver(id, initial);
        self.set_phase(id, ConnectionPhase::Open);
        self.broadcast_except(id, ServerMessage::Join(record.snapshot()));
        drop(state);

        self.metrics.connection_opened();
        tracing::info!(
            "Connection {} from {} is {} ({} players)",
            id,
            display_addr(addr),
            ConnectionPhase::Open,
            self.connections.len()
        );
        (id, rx)
    }

    /// Close a connection: deregister the player, announce the departure and
    /// drop its queue. Closing an unknown id does nothing.
    pub fn disconnect(&self, id: u64) {
        let Some((_, conn)) = self.connections.remove(&id) else {
            return;
        };

        let mut state = self.lock_state();
        let removed = state.remove_player(id);
        if removed.is_some() {
            self.broadcast_except(id, ServerMessage::Leave { id });
        }
        drop(state);

        self.metrics.connection_closed();
        tracing::info!(
            "Connection {} from {} is {}",
            id,
            display_addr(conn.addr),
            ConnectionPhase::Closed
        );
    }

    pub fn phase(&self, id: u64) -> ConnectionPhase {
        self.connections
            .get(&id)
            .map_or(ConnectionPhase::Closed, |c| c.phase)
    }

    fn set_phase(&self, id: u64, phase: ConnectionPhase) {
        if let Some(mut conn) = self.connections.get_mut(&id) {
            conn.phase = phase;
        }
    }

    // ── Incoming messages ───────────────────────────────────────────────

    /// Decode and handle one text frame. Malformed frames are logged and
    /// dropped; the connection stays open.
    pub fn handle_text(&self, id: u64, text: &str) {
        self.metrics.message_received();
        match ClientMessage::decode(text) {
            Ok(msg) => self.handle_message(id, msg),
            Err(e) => {
                self.metrics.malformed();
                tracing::warn!("Dropping malformed message from connection {}: {}", id, e);
            }
        }
    }

    pub fn handle_message(&self, id: u64, msg: ClientMessage) {
        if self.phase(id) != ConnectionPhase::Open {
            tracing::debug!("Ignoring message from connection {} that is not open", id);
            return;
        }
        match msg {
            ClientMessage::PlayerUpdate(player) => self.player_moved(id, player),
            ClientMessage::BlockUpdate(edit) => self.block_edited(id, edit),
        }
    }

    /// Store a heartbeat and relay it to every other connection, unfiltered.
    fn player_moved(&self, id: u64, player: PlayerState) {
        let mut state = self.lock_state();
        if let Some(snapshot) = state.update_player(id, player) {
            self.broadcast_except(id, ServerMessage::PlayerUpdate(snapshot));
        }
    }

    /// Apply a mutation and relay it to the other connections that can see
    /// it. Out-of-bounds positions are dropped.
    fn block_edited(&self, id: u64, edit: BlockEdit) {
        if !self.config.in_bounds(edit.position) {
            self.metrics.block_rejected();
            tracing::warn!(
                "Connection {} sent out-of-bounds block update at {}",
                id,
                edit.position
            );
            return;
        }

        let mut state = self.lock_state();
        let update = state.apply_block(edit, Some(id));
        self.metrics.block_applied();

        let mut filtered = 0;
        for conn in self.connections.iter() {
            let recipient = *conn.key();
            if recipient == id || conn.phase != ConnectionPhase::Open {
                continue;
            }
            if state.should_deliver(&update, recipient, self.config.view_distance) {
                self.try_deliver(recipient, &conn.tx, ServerMessage::BlockUpdate(update));
            } else {
                filtered += 1;
            }
        }
        drop(state);

        self.metrics.filtered(filtered);
        tracing::debug!(
            "Block {} set to {} by connection {} ({} recipients filtered)",
            update.position,
            update.block_type,
            id,
            filtered
        );
    }

    // ── Fan-out ─────────────────────────────────────────────────────────

    /// Queue `msg` for every open connection except `skip`.
    fn broadcast_except(&self, skip: u64, msg: ServerMessage) {
        for conn in self.connections.iter() {
            let recipient = *conn.key();
            if recipient == skip || conn.phase != ConnectionPhase::Open {
                continue;
            }
            self.try_deliver(recipient, &conn.tx, msg.clone());
        }
    }

    fn deliver(&self, id: u64, msg: ServerMessage) {
        if let Some(conn) = self.connections.get(&id) {
            self.try_deliver(id, &conn.tx, msg);
        }
    }

    fn try_deliver(&self, id: u64, tx: &mpsc::Sender<ServerMessage>, msg: ServerMessage) {
        match tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(msg)) => {
                self.metrics.dropped();
                tracing::warn!("Outbound queue full for connection {}, dropping {}", id, msg.kind());
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.dropped();
                tracing::debug!("Connection {} already gone", id);
            }
        }
    }

    // ── HTTP surface ────────────────────────────────────────────────────

    /// Full overlay and player list for `GET /api/world-state`.
    pub fn snapshot(&self) -> WorldSnapshot {
        self.lock_state().snapshot(self.config.seed)
    }

    /// The bounded update log for `GET /api/updates`.
    pub fn updates(&self) -> Vec<BlockUpdate> {
        self.lock_state().updates()
    }

    pub fn stats(&self) -> StatsSnapshot {
        let state = self.lock_state();
        self.metrics
            .snapshot(state.player_count() as u64, state.block_count() as u64)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

fn display_addr(addr: Option<SocketAddr>) -> String {
    addr.map_or_else(|| "<local>".to_string(), |a| a.to_string())
}
