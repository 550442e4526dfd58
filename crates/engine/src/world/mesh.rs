//! Visible-face mesh extraction.
//!
//! One quad per exposed block face, no merging. Positions are in world space
//! so the renderer can draw every chunk with the same transform.

use super::block::{atlas_rect, BlockType};
use super::chunk::Chunk;
use super::position::{BlockPos, LocalPos, CHUNK_SIZE};

/// The six faces of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    /// +Y
    Top,
    /// -Y
    Bottom,
    /// -X
    Left,
    /// +X
    Right,
    /// +Z
    Front,
    /// -Z
    Back,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Top,
        Face::Bottom,
        Face::Left,
        Face::Right,
        Face::Front,
        Face::Back,
    ];

    pub const fn normal(self) -> [i32; 3] {
        match self {
            Face::Top => [0, 1, 0],
            Face::Bottom => [0, -1, 0],
            Face::Left => [-1, 0, 0],
            Face::Right => [1, 0, 0],
            Face::Front => [0, 0, 1],
            Face::Back => [0, 0, -1],
        }
    }

    /// Unit-cube corners, counter-clockwise seen from outside, starting at
    /// the corner that takes the tile's bottom-left texel.
    const fn corners(self) -> [[f32; 3]; 4] {
        match self {
            Face::Top => [[0., 1., 1.], [1., 1., 1.], [1., 1., 0.], [0., 1., 0.]],
            Face::Bottom => [[0., 0., 0.], [1., 0., 0.], [1., 0., 1.], [0., 0., 1.]],
            Face::Left => [[0., 0., 0.], [0., 0., 1.], [0., 1., 1.], [0., 1., 0.]],
            Face::Right => [[1., 0., 1.], [1., 0., 0.], [1., 1., 0.], [1., 1., 1.]],
            Face::Front => [[0., 0., 1.], [1., 0., 1.], [1., 1., 1.], [0., 1., 1.]],
            Face::Back => [[1., 0., 0.], [0., 0., 0.], [0., 1., 0.], [1., 1., 0.]],
        }
    }

    fn tile(self, block: BlockType) -> u16 {
        let textures = &block.data().textures;
        match self {
            Face::Top => textures.top,
            Face::Bottom => textures.bottom,
            Face::Left => textures.left,
            Face::Right => textures.right,
            Face::Front => textures.front,
            Face::Back => textures.back,
        }
    }
}

/// Whether the face of `current` that touches `neighbor` is visible.
#[inline]
pub fn face_visible(current: BlockType, neighbor: BlockType) -> bool {
    if neighbor.is_air() {
        return true;
    }
    let (cur_t, nb_t) = (current.is_transparent(), neighbor.is_transparent());
    (nb_t && !cur_t) || (cur_t && nb_t && current != neighbor)
}

/// Renderable geometry for one chunk. Four vertices and six indices per face.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    pub fn face_count(&self) -> usize {
        self.indices.len() / 6
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    fn push_face(&mut self, pos: BlockPos, face: Face, block: BlockType) {
        let base = self.positions.len() as u32;
        let [nx, ny, nz] = face.normal();
        let normal = [nx as f32, ny as f32, nz as f32];
        let [u0, v0, u1, v1] = atlas_rect(face.tile(block));
        let uvs = [[u0, v1], [u1, v1], [u1, v0], [u0, v0]];

        for (corner, uv) in face.corners().into_iter().zip(uvs) {
            self.positions.push([
                pos.x as f32 + corner[0],
                pos.y as f32 + corner[1],
                pos.z as f32 + corner[2],
            ]);
            self.normals.push(normal);
            self.uvs.push(uv);
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Extract the visible faces of `chunk`.
///
/// Neighbors inside the chunk are read directly; the rest go through
/// `lookup`, which must answer air for unloaded chunks so edge faces are
/// over-drawn rather than dropped. Returns `None` when nothing is visible.
pub fn build(chunk: &Chunk, lookup: impl Fn(BlockPos) -> BlockType) -> Option<ChunkMesh> {
    if chunk.is_empty() {
        return None;
    }

    let mut mesh = ChunkMesh::default();
    let origin = chunk.pos().origin();

    for y in 0..CHUNK_SIZE {
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let block = chunk.get(LocalPos::new(x as u8, y as u8, z as u8));
                if block.is_air() {
                    continue;
                }
                let pos = origin.offset(x, y, z);

                for face in Face::ALL {
                    let [dx, dy, dz] = face.normal();
                    let (nx, ny, nz) = (x + dx, y + dy, z + dz);
                    let inside = (0..CHUNK_SIZE).contains(&nx)
                        && (0..CHUNK_SIZE).contains(&ny)
                        && (0..CHUNK_SIZE).contains(&nz);
                    let neighbor = if inside {
                        chunk.get(LocalPos::new(nx as u8, ny as u8, nz as u8))
                    } else {
                        lookup(pos.offset(dx, dy, dz))
                    };

                    if face_visible(block, neighbor) {
                        mesh.push_face(pos, face, block);
                    }
                }
            }
        }
    }

    (!mesh.indices.is_empty()).then_some(mesh)
}
