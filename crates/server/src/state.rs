//! Authoritative game state: connected players, the sparse block overlay and
//! the bounded update log.
//!
//! Plain data. The hub owns it behind one mutex, so every method here runs
//! with all other connection events excluded.

use std::collections::{HashMap, VecDeque};

use blockworld_engine::{BlockPos, BlockType};
use blockworld_protocol::{
    unix_millis, BlockEdit, BlockUpdate, PlayerSnapshot, PlayerState, Rotation, SnapshotBlock,
    Vec3, WorldSnapshot,
};
use indexmap::IndexMap;

/// Strictly increasing millisecond clock. Two reads never return the same
/// value, so "after connection time" comparisons are exact.
#[derive(Debug, Default)]
pub struct Clock {
    last: u64,
}

impl Clock {
    pub fn now(&mut self) -> u64 {
        let t = unix_millis().max(self.last + 1);
        self.last = t;
        t
    }
}

/// Information about a connected player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub id: u64,
    pub username: String,
    pub position: Vec3,
    pub rotation: Rotation,
    pub selected_block: BlockType,
    /// Server time the connection opened.
    pub connected_at: u64,
}

impl PlayerRecord {
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            username: self.username.clone(),
            position: self.position,
            rotation: self.rotation,
            selected_block: self.selected_block,
        }
    }
}

/// One overlay entry. Air is stored like any other block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredBlock {
    pub block: BlockType,
    pub timestamp: u64,
}

pub struct GameState {
    players: HashMap<u64, PlayerRecord>,
    blocks: IndexMap<BlockPos, StoredBlock>,
    updates: VecDeque<BlockUpdate>,
    update_capacity: usize,
    clock: Clock,
}

impl GameState {
    pub fn new(update_capacity: usize) -> Self {
        Self {
            players: HashMap::new(),
            blocks: IndexMap::new(),
            updates: VecDeque::with_capacity(update_capacity.min(4096)),
            update_capacity,
            clock: Clock::default(),
        }
    }

    pub fn now(&mut self) -> u64 {
        self.clock.now()
    }

    // ── Players ─────────────────────────────────────────────────────────

    /// Register a player at `spawn`, stamped with the current server time.
    pub fn add_player(&mut self, id: u64, spawn: Vec3) -> &PlayerRecord {
        let record = PlayerRecord {
            id,
            username: format!("Player{id}"),
            position: spawn,
            rotation: Rotation::default(),
            selected_block: BlockType::Grass,
            connected_at: self.clock.now(),
        };
        self.players.entry(id).insert_entry(record).into_mut()
    }

    pub fn remove_player(&mut self, id: u64) -> Option<PlayerRecord> {
        self.players.remove(&id)
    }

    /// Store a movement heartbeat. `None` for an unknown player.
    pub fn update_player(&mut self, id: u64, state: PlayerState) -> Option<PlayerSnapshot> {
        let record = self.players.get_mut(&id)?;
        record.position = state.position;
        record.rotation = state.rotation;
        record.selected_block = state.selected_block;
        Some(record.snapshot())
    }

    pub fn player(&self, id: u64) -> Option<&PlayerRecord> {
        self.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Every player except `id`, in id order.
    pub fn players_except(&self, id: u64) -> Vec<PlayerSnapshot> {
        let mut players: Vec<PlayerSnapshot> = self
            .players
            .values()
            .filter(|p| p.id != id)
            .map(PlayerRecord::snapshot)
            .collect();
        players.sort_by_key(|p| p.id);
        players
    }

    // ── Blocks ──────────────────────────────────────────────────────────

    /// Record a mutation in the overlay and the update log.
    pub fn apply_block(&mut self, edit: BlockEdit, player_id: Option<u64>) -> BlockUpdate {
        let timestamp = self.clock.now();
        self.blocks.insert(
            edit.position,
            StoredBlock {
                block: edit.block_type,
                timestamp,
            },
        );

        let update = BlockUpdate {
            position: edit.position,
            block_type: edit.block_type,
            timestamp,
            player_id,
        };
        if self.update_capacity > 0 {
            if self.updates.len() == self.update_capacity {
                self.updates.pop_front();
            }
            self.updates.push_back(update);
        }
        update
    }

    pub fn block(&self, pos: BlockPos) -> Option<StoredBlock> {
        self.blocks.get(&pos).copied()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The update log, oldest first.
    pub fn updates(&self) -> Vec<BlockUpdate> {
        self.updates.iter().copied().collect()
    }

    /// Whether `update` should reach `recipient`: the recipient connected
    /// before the mutation and is within `view_distance` of it.
    pub fn should_deliver(&self, update: &BlockUpdate, recipient: u64, view_distance: f32) -> bool {
        let Some(player) = self.players.get(&recipient) else {
            return false;
        };
        if update.timestamp <= player.connected_at {
            return false;
        }
        player.position.distance(Vec3::from(update.position)) <= view_distance
    }

    /// The full overlay and player list.
    pub fn snapshot(&mut self, seed: u32) -> WorldSnapshot {
        let blocks = self
            .blocks
            .iter()
            .map(|(pos, stored)| SnapshotBlock {
                pos: *pos,
                block: stored.block,
            })
            .collect();
        let mut players: Vec<PlayerSnapshot> =
            self.players.values().map(PlayerRecord::snapshot).collect();
        players.sort_by_key(|p| p.id);
        WorldSnapshot {
            blocks,
            players,
            timestamp: self.clock.now(),
            seed: Some(seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(x: i32, y: i32, z: i32, block: BlockType) -> BlockEdit {
        BlockEdit {
            position: BlockPos::new(x, y, z),
            block_type: block,
        }
    }

    #[test]
    fn clock_is_strictly_increasing() {
        let mut clock = Clock::default();
        let mut last = 0;
        for _ in 0..1000 {
            let t = clock.now();
            assert!(t > last);
            last = t;
        }
    }

    #[test]
    fn air_is_kept_in_the_overlay() {
        let mut state = GameState::new(10);
        state.apply_block(edit(1, 2, 3, BlockType::Stone), Some(1));
        state.apply_block(edit(1, 2, 3, BlockType::Air), Some(1));
        assert_eq!(state.block_count(), 1);
        assert_eq!(
            state.block(BlockPos::new(1, 2, 3)).map(|b| b.block),
            Some(BlockType::Air)
        );
    }

    #[test]
    fn update_log_is_bounded() {
        let mut state = GameState::new(3);
        for x in 0..5 {
            state.apply_block(edit(x, 10, 0, BlockType::Dirt), None);
        }
        let log = state.updates();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].position.x, 2);
        assert_eq!(log[2].position.x, 4);
        assert!(log.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn delivery_respects_distance_and_connection_time() {
        let mut state = GameState::new(10);
        state.add_player(1, Vec3::new(0.5, 50.0, 0.5));
        let early = state.apply_block(edit(2, 50, 2, BlockType::Dirt), None);
        state.add_player(2, Vec3::new(0.5, 50.0, 0.5));
        state.add_player(3, Vec3::new(500.0, 50.0, 0.5));

        let update = state.apply_block(edit(3, 50, 3, BlockType::Dirt), Some(1));
        assert!(state.should_deliver(&update, 2, 64.0));
        assert!(!state.should_deliver(&update, 3, 64.0));
        // Player 2 joined after `early` was applied.
        assert!(state.should_deliver(&early, 1, 64.0));
        assert!(!state.should_deliver(&early, 2, 64.0));
        assert!(!state.should_deliver(&update, 99, 64.0));
    }

    #[test]
    fn snapshot_lists_overlay_and_players() {
        let mut state = GameState::new(10);
        state.add_player(4, Vec3::new(0.0, 0.0, 0.0));
        state.add_player(2, Vec3::new(0.0, 0.0, 0.0));
        state.apply_block(edit(0, 1, 0, BlockType::Glass), Some(2));
        let snapshot = state.snapshot(9);
        assert_eq!(snapshot.seed, Some(9));
        assert_eq!(snapshot.blocks.len(), 1);
        assert_eq!(
            snapshot.players.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![2, 4]
        );
        assert_eq!(state.players_except(2).len(), 1);
    }

    #[test]
    fn heartbeat_for_unknown_player_is_ignored() {
        let mut state = GameState::new(10);
        let heartbeat = PlayerState {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Rotation::default(),
            selected_block: BlockType::Dirt,
        };
        assert!(state.update_player(5, heartbeat).is_none());
        state.add_player(5, Vec3::default());
        let snapshot = state.update_player(5, heartbeat).unwrap();
        assert_eq!(snapshot.position, Vec3::new(1.0, 2.0, 3.0));
    }
}
