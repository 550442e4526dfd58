use super::block::BlockType;
use super::mesh::{self, ChunkMesh};
use super::position::{BlockPos, ChunkPos, LocalPos, CHUNK_SIZE};

/// Total block count in one chunk.
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE) as usize;

/// A 16x16x16 cube of blocks plus its derived mesh.
///
/// Stored as a flat array, Y-major with X varying fastest
/// (`y * 256 + z * 16 + x`). A chunk never references its
/// neighbors; meshing takes a lookup for anything past its own faces.
#[derive(Clone)]
pub struct Chunk {
    pos: ChunkPos,
    blocks: Box<[BlockType; CHUNK_VOLUME]>,
    mesh: Option<ChunkMesh>,
    dirty: bool,
}

impl Chunk {
    /// An all-air chunk.
    pub fn new(pos: ChunkPos) -> Self {
        Self::from_blocks(pos, Box::new([BlockType::Air; CHUNK_VOLUME]))
    }

    /// A chunk pre-filled from generator or snapshot data. Starts dirty.
    pub fn from_blocks(pos: ChunkPos, blocks: Box<[BlockType; CHUNK_VOLUME]>) -> Self {
        Self {
            pos,
            blocks,
            mesh: None,
            dirty: true,
        }
    }

    #[inline]
    pub const fn index(local: LocalPos) -> usize {
        let size = CHUNK_SIZE as usize;
        (local.y as usize) * size * size + (local.z as usize) * size + (local.x as usize)
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    #[inline]
    pub fn get(&self, local: LocalPos) -> BlockType {
        self.blocks[Self::index(local)]
    }

    /// Write a block. Marks the chunk dirty and returns the previous block
    /// when it actually changed.
    pub fn set(&mut self, local: LocalPos, block: BlockType) -> Option<BlockType> {
        let slot = &mut self.blocks[Self::index(local)];
        if *slot == block {
            return None;
        }
        let old = std::mem::replace(slot, block);
        self.dirty = true;
        Some(old)
    }

    /// Read by world position; `None` if the position is outside this chunk.
    pub fn get_world(&self, pos: BlockPos) -> Option<BlockType> {
        (pos.chunk() == self.pos).then(|| self.get(pos.local()))
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.is_air())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mesh(&self) -> Option<&ChunkMesh> {
        self.mesh.as_ref()
    }

    /// Compute fresh geometry without touching the chunk. Pair with
    /// [`Chunk::install_mesh`] when `lookup` borrows the chunk's owner.
    pub fn build_mesh(&self, lookup: impl Fn(BlockPos) -> BlockType) -> Option<ChunkMesh> {
        mesh::build(self, lookup)
    }

    /// Replace the geometry (releasing any previous mesh) and clear `dirty`.
    pub fn install_mesh(&mut self, mesh: Option<ChunkMesh>) {
        self.mesh = mesh;
        self.dirty = false;
    }

    pub fn rebuild_mesh(&mut self, lookup: impl Fn(BlockPos) -> BlockType) {
        let mesh = self.build_mesh(lookup);
        self.install_mesh(mesh);
    }

    /// Release geometry before the chunk is dropped from the world.
    pub fn dispose(&mut self) {
        self.mesh = None;
        self.dirty = true;
    }

    /// Every non-air block with its world position.
    pub fn iter_solid(&self) -> impl Iterator<Item = (BlockPos, BlockType)> + '_ {
        let origin = self.pos.origin();
        let size = CHUNK_SIZE as usize;
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_air())
            .map(move |(i, b)| {
                let x = (i % size) as i32;
                let z = ((i / size) % size) as i32;
                let y = (i / (size * size)) as i32;
                (origin.offset(x, y, z), *b)
            })
    }
}
