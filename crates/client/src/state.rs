//! Client-side reconciliation of server messages with the local world.
//!
//! Plain data driven by the session loop. Remote mutations are applied with
//! `Origin::FromNetwork` so they never re-enter the outbox; only edits made
//! through [`ClientState::place_block`] are sent.

use std::collections::HashMap;
use std::time::Instant;

use blockworld_engine::world::LoadReport;
use blockworld_engine::worldgen::SPAWN_POINT;
use blockworld_engine::{BlockChange, BlockPos, BlockType, Origin, TerrainGenerator, World};
use blockworld_protocol::{
    BlockEdit, BlockUpdate, ClientMessage, PlayerSnapshot, PlayerState, Rotation, ServerMessage,
    WorldSnapshot,
};

use crate::config::ClientConfig;
use crate::throttle::MovementThrottle;

pub struct ClientState {
    config: ClientConfig,
    world: World,
    player_id: Option<u64>,
    /// Everyone but us, keyed by connection id.
    players: HashMap<u64, PlayerSnapshot>,
    /// Mutations to replay over the next snapshot: everything received
    /// before bootstrap, and everything applied while a refresh is running.
    pending: Vec<Buffered>,
    local: PlayerState,
    throttle: MovementThrottle,
    /// Terrain has been loaded since the last bootstrap.
    terrain_loaded: bool,
    /// Buffering for a refresh snapshot.
    refreshing: bool,
    /// A refresh snapshot should be fetched.
    refresh_requested: bool,
}

/// A mutation waiting to be replayed over a snapshot.
#[derive(Debug, Clone, Copy)]
enum Buffered {
    Remote(BlockUpdate),
    /// Our own edit; the server's timestamp for it is unknown.
    Local(BlockChange),
}

impl ClientState {
    pub fn new(config: ClientConfig) -> Self {
        let world = World::new(TerrainGenerator::new(config.seed), config.world_config());
        let throttle = MovementThrottle::new(config.throttle);
        Self {
            config,
            world,
            player_id: None,
            players: HashMap::new(),
            pending: Vec::new(),
            local: PlayerState {
                position: SPAWN_POINT.into(),
                rotation: Rotation::default(),
                selected_block: BlockType::Grass,
            },
            throttle,
            terrain_loaded: false,
            refreshing: false,
            refresh_requested: false,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn player_id(&self) -> Option<u64> {
        self.player_id
    }

    pub fn players(&self) -> &HashMap<u64, PlayerSnapshot> {
        &self.players
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Bootstrapped and accepting incremental updates directly.
    pub fn is_ready(&self) -> bool {
        self.world.is_initialized()
    }

    /// A refresh snapshot is being waited for.
    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn local_player(&self) -> &PlayerState {
        &self.local
    }

    pub fn set_local_player(&mut self, state: PlayerState) {
        self.local = state;
    }

    // ── Incoming ────────────────────────────────────────────────────────

    pub fn handle_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::InitialState(initial) => {
                tracing::info!(
                    "Joined as player {} with {} others online",
                    initial.player_id,
                    initial.players.len()
                );
                self.player_id = Some(initial.player_id);
                self.players.remove(&initial.player_id);
                if let Some(seed) = initial.seed {
                    self.adopt_seed(seed);
                }
                self.local.position = initial.spawn;
                for player in initial.players {
                    self.add_player(player);
                }
            }
            ServerMessage::Join(player) => self.add_player(player),
            ServerMessage::Leave { id } => {
                self.players.remove(&id);
            }
            ServerMessage::PlayerUpdate(player) => {
                if Some(player.id) != self.player_id {
                    self.players.insert(player.id, player);
                }
            }
            ServerMessage::BlockUpdate(update) => self.remote_block(update),
        }
    }

    /// Add a player we have not seen yet. Known ids are left alone.
    fn add_player(&mut self, player: PlayerSnapshot) {
        if Some(player.id) == self.player_id {
            return;
        }
        self.players.entry(player.id).or_insert(player);
    }

    fn remote_block(&mut self, update: BlockUpdate) {
        if update.player_id.is_some() && update.player_id == self.player_id {
            tracing::debug!("Ignoring echo of our own edit at {}", update.position);
            return;
        }
        if !self.world.is_initialized() {
            self.pending.push(Buffered::Remote(update));
            return;
        }
        self.world
            .set_block(update.position, update.block_type, Origin::FromNetwork);
        if self.refreshing {
            self.pending.push(Buffered::Remote(update));
        }
    }

    /// Switch terrain seed, keeping every known edit.
    fn adopt_seed(&mut self, seed: u32) {
        if seed == self.world.seed() {
            return;
        }
        tracing::info!("Server uses seed {}, regenerating world (was {})", seed, self.world.seed());
        let edits: Vec<(BlockPos, BlockType)> = self.world.edits().collect();
        let was_ready = self.world.is_initialized();
        self.world = World::new(TerrainGenerator::new(seed), self.config.world_config());
        if was_ready {
            self.world.apply_snapshot(edits);
        }
    }

    // ── Bootstrap ───────────────────────────────────────────────────────

    /// Replace the local overlay with the server's and replay whatever was
    /// buffered after the snapshot was taken. Serves both the first
    /// bootstrap and later refreshes.
    pub fn apply_snapshot(&mut self, snapshot: &WorldSnapshot) {
        if let Some(seed) = snapshot.seed {
            self.adopt_seed(seed);
        }
        self.world.apply_snapshot(snapshot.block_pairs());
        for player in &snapshot.players {
            self.add_player(player.clone());
        }
        let replayed = self.replay_pending(Some(snapshot.timestamp));
        if self.refreshing {
            tracing::debug!(
                "World refreshed: {} blocks, {} buffered updates replayed",
                snapshot.blocks.len(),
                replayed
            );
        } else {
            tracing::info!(
                "World bootstrapped: {} blocks, {} players, {} buffered updates replayed",
                snapshot.blocks.len(),
                self.players.len(),
                replayed
            );
        }
        self.refreshing = self.refresh_requested;
    }

    /// Give up on the snapshot and run on locally generated terrain plus
    /// whatever edits are already known.
    pub fn initialize_empty(&mut self) {
        self.world.mark_initialized();
        let replayed = self.replay_pending(None);
        tracing::warn!(
            "Starting without a server snapshot ({} buffered updates replayed)",
            replayed
        );
    }

    /// Replay buffered mutations in arrival order. Remote updates not newer
    /// than `after` are already in the snapshot. Own edits are kept unless a
    /// later remote update for the same block supersedes them.
    fn replay_pending(&mut self, after: Option<u64>) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let mut replayed = 0;
        for (i, entry) in pending.iter().enumerate() {
            let (pos, block) = match *entry {
                Buffered::Remote(update) => {
                    if after.is_some_and(|t| update.timestamp <= t) {
                        continue;
                    }
                    (update.position, update.block_type)
                }
                Buffered::Local(change) => {
                    let superseded = pending[i + 1..].iter().any(|later| {
                        matches!(later, Buffered::Remote(u) if u.position == change.pos)
                    });
                    if superseded {
                        continue;
                    }
                    (change.pos, change.block)
                }
            };
            self.world.set_block(pos, block, Origin::FromNetwork);
            replayed += 1;
        }
        replayed
    }

    /// The next refresh fetch to start, if one is wanted.
    pub fn take_refresh_request(&mut self) -> bool {
        std::mem::take(&mut self.refresh_requested)
    }

    /// The refresh fetch gave up. Everything buffered is already applied.
    pub fn abandon_refresh(&mut self) {
        tracing::warn!("World refresh failed, keeping local state");
        self.pending.clear();
        self.refreshing = self.refresh_requested;
    }

    // ── Outgoing ────────────────────────────────────────────────────────

    /// Apply a locally authored edit. Returns whether the block changed.
    /// Refused until the world is bootstrapped.
    pub fn place_block(&mut self, pos: BlockPos, block: BlockType) -> bool {
        if !self.is_ready() {
            return false;
        }
        let changed = self.world.set_block(pos, block, Origin::Local);
        if changed && self.refreshing {
            self.pending.push(Buffered::Local(BlockChange { pos, block }));
        }
        changed
    }

    fn request_refresh(&mut self) {
        if !self.refreshing {
            // Edits still in the outbox may reach the server after the
            // snapshot is served.
            for change in self.world.outgoing() {
                self.pending.push(Buffered::Local(*change));
            }
        }
        self.refreshing = true;
        self.refresh_requested = true;
    }

    /// Drain local edits into wire messages.
    pub fn drain_block_edits(&mut self) -> Vec<ClientMessage> {
        self.world
            .take_outgoing()
            .into_iter()
            .map(|change| {
                ClientMessage::BlockUpdate(BlockEdit {
                    position: change.pos,
                    block_type: change.block,
                })
            })
            .collect()
    }

    /// One turn of the client loop: load chunks around the player once the
    /// world is ready, then collect everything due to be sent.
    ///
    /// Chunks loaded after the first load may hold updates the server
    /// filtered out while we were away, so they request a refresh.
    pub fn tick(&mut self, now: Instant) -> (LoadReport, Vec<ClientMessage>) {
        let report = if self.world.is_initialized() {
            self.world.update(self.local.position.to_array())
        } else {
            LoadReport::default()
        };
        if report.loaded > 0 {
            if self.terrain_loaded {
                self.request_refresh();
            }
            self.terrain_loaded = true;
        }

        let mut out = self.drain_block_edits();
        if self.player_id.is_some() && self.throttle.should_send(&self.local, now) {
            out.push(ClientMessage::PlayerUpdate(self.local));
        }
        (report, out)
    }

    /// Forget everything tied to the lost connection. The world must be
    /// bootstrapped again before it is trusted.
    pub fn on_disconnect(&mut self) {
        self.players.clear();
        self.player_id = None;
        self.pending.clear();
        self.throttle.reset();
        // Unsent edits die with the session; the next snapshot decides.
        self.world.take_outgoing();
        self.world.invalidate();
        self.terrain_loaded = false;
        self.refreshing = false;
        self.refresh_requested = false;
    }
}
