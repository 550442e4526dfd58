pub mod block;
pub mod chunk;
pub mod mesh;
pub mod position;
pub mod raycast;

use std::collections::HashMap;

use rayon::prelude::*;

use crate::worldgen::TerrainGenerator;
use block::BlockType;
use chunk::Chunk;
use position::{BlockPos, ChunkPos};

/// Where a mutation came from. Only `Local` changes are queued for sending,
/// which is what keeps peers from echoing each other's updates forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Authored here; must be broadcast.
    Local,
    /// Received from the network; must not be re-sent.
    FromNetwork,
}

/// A block mutation as it travels between world and network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockChange {
    pub pos: BlockPos,
    pub block: BlockType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldConfig {
    /// Chunks within this planar radius (in chunks) of the viewer are loaded.
    pub load_radius: i32,
    /// Extra radius before a loaded chunk is evicted.
    pub unload_margin: i32,
    pub min_chunk_y: i32,
    pub max_chunk_y: i32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            load_radius: 4,
            unload_margin: 2,
            min_chunk_y: 0,
            max_chunk_y: 5,
        }
    }
}

/// What one [`World::update`] tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub unloaded: usize,
    pub remeshed: usize,
}

/// The chunks around one viewer plus the sparse overlay of edits.
///
/// The overlay (`edits`) is this peer's copy of the authoritative state:
/// every block known to differ from, or to have been explicitly set over,
/// freshly generated terrain. Removals are kept as explicit air entries, so a
/// dug-out block stays dug out when its chunk is generated again.
pub struct World {
    generator: TerrainGenerator,
    config: WorldConfig,
    chunks: HashMap<ChunkPos, Chunk>,
    edits: HashMap<ChunkPos, HashMap<BlockPos, BlockType>>,
    outgoing: Vec<BlockChange>,
    initialized: bool,
}

impl World {
    pub fn new(generator: TerrainGenerator, config: WorldConfig) -> Self {
        Self {
            generator,
            config,
            chunks: HashMap::new(),
            edits: HashMap::new(),
            outgoing: Vec::new(),
            initialized: false,
        }
    }

    pub fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn seed(&self) -> u32 {
        self.generator.seed()
    }

    /// True once a snapshot or local generation has populated the world.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Forget that the world was ever ready (e.g. after losing the server).
    pub fn invalidate(&mut self) {
        self.initialized = false;
    }

    /// Read a block. Unloaded chunks read as air.
    pub fn get_block(&self, pos: BlockPos) -> BlockType {
        match self.chunks.get(&pos.chunk()) {
            Some(chunk) => chunk.get(pos.local()),
            None => BlockType::Air,
        }
    }

    pub fn has_chunk(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Insert a chunk, laying any known edits over it. The chunk and its
    /// loaded face neighbors are left dirty; call [`World::rebuild_dirty`].
    pub fn insert_chunk(&mut self, mut chunk: Chunk) {
        let pos = chunk.pos();
        if let Some(edits) = self.edits.get(&pos) {
            for (block_pos, block) in edits {
                chunk.set(block_pos.local(), *block);
            }
        }
        chunk.mark_dirty();
        if let Some(mut old) = self.chunks.insert(pos, chunk) {
            old.dispose();
        }

        for (dx, dy, dz) in FACE_OFFSETS {
            if let Some(neighbor) = self.chunks.get_mut(&pos.offset(dx, dy, dz)) {
                neighbor.mark_dirty();
            }
        }
    }

    /// Drop a chunk and release its geometry.
    pub fn remove_chunk(&mut self, pos: ChunkPos) -> bool {
        match self.chunks.remove(&pos) {
            Some(mut chunk) => {
                chunk.dispose();
                true
            }
            None => false,
        }
    }

    /// Apply a mutation and bring every affected mesh up to date before
    /// returning. Returns whether anything changed.
    ///
    /// Writes into unloaded chunks are dropped; a `FromNetwork` write is still
    /// remembered in the overlay so the chunk comes back correct.
    pub fn set_block(&mut self, pos: BlockPos, block: BlockType, origin: Origin) -> bool {
        if origin == Origin::FromNetwork {
            self.record_edit(pos, block);
        }

        let Some(affected) = self.write_block(pos, block) else {
            return false;
        };
        if origin == Origin::Local {
            self.record_edit(pos, block);
            self.outgoing.push(BlockChange { pos, block });
        }

        for chunk_pos in affected {
            self.rebuild_chunk(chunk_pos);
        }
        true
    }

    /// Write into a loaded chunk and mark every chunk whose mesh can see the
    /// block dirty. `None` if the chunk is absent or the block is unchanged.
    fn write_block(&mut self, pos: BlockPos, block: BlockType) -> Option<Vec<ChunkPos>> {
        let chunk = self.chunks.get_mut(&pos.chunk())?;
        chunk.set(pos.local(), block)?;

        let affected: Vec<ChunkPos> = affected_chunks(pos)
            .into_iter()
            .filter(|c| self.chunks.contains_key(c))
            .collect();
        for chunk_pos in &affected {
            if let Some(chunk) = self.chunks.get_mut(chunk_pos) {
                chunk.mark_dirty();
            }
        }
        Some(affected)
    }

    fn record_edit(&mut self, pos: BlockPos, block: BlockType) {
        self.edits.entry(pos.chunk()).or_default().insert(pos, block);
    }

    /// Rebuild one chunk's mesh from the current block data.
    fn rebuild_chunk(&mut self, pos: ChunkPos) -> bool {
        let mesh = match self.chunks.get(&pos) {
            Some(chunk) => chunk.build_mesh(|p| self.get_block(p)),
            None => return false,
        };
        if let Some(chunk) = self.chunks.get_mut(&pos) {
            chunk.install_mesh(mesh);
        }
        true
    }

    /// Rebuild every dirty chunk. Returns how many were rebuilt.
    pub fn rebuild_dirty(&mut self) -> usize {
        let dirty: Vec<ChunkPos> = self
            .chunks
            .values()
            .filter(|c| c.is_dirty())
            .map(|c| c.pos())
            .collect();
        for pos in &dirty {
            self.rebuild_chunk(*pos);
        }
        dirty.len()
    }

    /// Locally authored changes not yet drained.
    pub fn outgoing(&self) -> &[BlockChange] {
        &self.outgoing
    }

    /// Drain the locally authored changes waiting to be sent.
    pub fn take_outgoing(&mut self) -> Vec<BlockChange> {
        std::mem::take(&mut self.outgoing)
    }

    /// The overlay entry at `pos`, if one was ever recorded.
    pub fn edit_at(&self, pos: BlockPos) -> Option<BlockType> {
        self.edits.get(&pos.chunk())?.get(&pos).copied()
    }

    pub fn edits(&self) -> impl Iterator<Item = (BlockPos, BlockType)> + '_ {
        self.edits
            .values()
            .flat_map(|m| m.iter().map(|(p, b)| (*p, *b)))
    }

    pub fn edit_count(&self) -> usize {
        self.edits.values().map(HashMap::len).sum()
    }

    /// Replace the overlay with an authoritative snapshot and mark the world
    /// ready. Positions that were edited before but are missing from the
    /// snapshot revert to generated terrain. Applying the same snapshot twice
    /// changes nothing.
    pub fn apply_snapshot(&mut self, blocks: impl IntoIterator<Item = (BlockPos, BlockType)>) {
        let incoming: HashMap<BlockPos, BlockType> = blocks.into_iter().collect();

        let mut stale: HashMap<ChunkPos, Vec<BlockPos>> = HashMap::new();
        for (pos, _) in self.edits() {
            if !incoming.contains_key(&pos) && self.chunks.contains_key(&pos.chunk()) {
                stale.entry(pos.chunk()).or_default().push(pos);
            }
        }
        self.edits.clear();

        for (chunk_pos, positions) in stale {
            let fresh = self.generator.generate_chunk(chunk_pos);
            for pos in positions {
                self.write_block(pos, fresh.get(pos.local()));
            }
        }

        for (pos, block) in incoming {
            self.record_edit(pos, block);
            self.write_block(pos, block);
        }

        self.rebuild_dirty();
        self.initialized = true;
    }

    /// Load missing chunks inside the load radius around `viewer`, evict
    /// those beyond radius + margin, and remesh whatever became dirty.
    pub fn update(&mut self, viewer: [f32; 3]) -> LoadReport {
        let center = BlockPos::containing(viewer).chunk();
        let radius = self.config.load_radius as i64;
        let keep = (self.config.load_radius + self.config.unload_margin) as i64;

        let evict: Vec<ChunkPos> = self
            .chunks
            .keys()
            .filter(|c| c.planar_distance_sq(center) > keep * keep)
            .copied()
            .collect();
        for pos in &evict {
            self.remove_chunk(*pos);
        }

        let mut missing = Vec::new();
        let r = self.config.load_radius;
        for dx in -r..=r {
            for dz in -r..=r {
                for cy in self.config.min_chunk_y..=self.config.max_chunk_y {
                    let pos = ChunkPos::new(center.x + dx, cy, center.z + dz);
                    if pos.planar_distance_sq(center) <= radius * radius
                        && !self.chunks.contains_key(&pos)
                    {
                        missing.push(pos);
                    }
                }
            }
        }

        let generator = &self.generator;
        let generated: Vec<Chunk> = missing
            .par_iter()
            .map(|pos| generator.generate_chunk(*pos))
            .collect();
        let loaded = generated.len();
        for chunk in generated {
            self.insert_chunk(chunk);
        }

        let remeshed = self.rebuild_dirty();
        if loaded > 0 || !evict.is_empty() {
            tracing::debug!(
                "World update around {:?}: {} loaded, {} unloaded, {} remeshed",
                center,
                loaded,
                evict.len(),
                remeshed
            );
        }

        LoadReport {
            loaded,
            unloaded: evict.len(),
            remeshed,
        }
    }
}

const FACE_OFFSETS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// The chunk holding `pos` plus every chunk across a face, edge or corner
/// that `pos` touches.
pub fn affected_chunks(pos: BlockPos) -> Vec<ChunkPos> {
    let home = pos.chunk();
    let [bx, by, bz] = pos.local().boundary_offsets();
    let mut out = Vec::with_capacity(8);
    for dx in std::iter::once(0).chain(bx) {
        for dy in std::iter::once(0).chain(by) {
            for dz in std::iter::once(0).chain(bz) {
                out.push(home.offset(dx, dy, dz));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_block_affects_only_its_chunk() {
        assert_eq!(
            affected_chunks(BlockPos::new(5, 5, 5)),
            vec![ChunkPos::new(0, 0, 0)]
        );
    }

    #[test]
    fn face_edge_and_corner_neighbors() {
        let face = affected_chunks(BlockPos::new(16, 10, 10));
        assert_eq!(face, vec![ChunkPos::new(1, 0, 0), ChunkPos::new(0, 0, 0)]);

        let edge = affected_chunks(BlockPos::new(15, 15, 7));
        assert_eq!(edge.len(), 4);
        assert!(edge.contains(&ChunkPos::new(1, 1, 0)));

        let corner = affected_chunks(BlockPos::new(0, 0, 0));
        assert_eq!(corner.len(), 8);
        assert!(corner.contains(&ChunkPos::new(-1, -1, -1)));
    }
}
