//! Tree placement, a cosmetic pass over already generated terrain.
//!
//! Each column rolls its own `SmallRng` seeded from the column hash, so a tree
//! rooted in a neighboring chunk still contributes its leaves here and
//! canopies line up across chunk edges.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::{coord_hash, TerrainGenerator, WATER_LEVEL};
use crate::world::block::BlockType;
use crate::world::chunk::Chunk;
use crate::world::position::{BlockPos, CHUNK_SIZE};

const MIN_TRUNK: i32 = 4;
const MAX_TRUNK: i32 = 6;
const MIN_CANOPY: i32 = 2;
const MAX_CANOPY: i32 = 3;
/// Columns this close to the origin never grow trees.
const SPAWN_CLEARANCE_SQ: i64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tree {
    /// Lowest trunk block, directly above the surface.
    pub base: BlockPos,
    pub trunk_height: i32,
    pub canopy_radius: i32,
}

impl Tree {
    /// Every block of the tree; trunk first.
    pub fn blocks(&self) -> Vec<(BlockPos, BlockType)> {
        let mut out = Vec::new();
        for dy in 0..self.trunk_height {
            out.push((self.base.offset(0, dy, 0), BlockType::Wood));
        }

        let top = self.base.offset(0, self.trunk_height - 1, 0);
        for dy in -2..=1 {
            let r = if dy == 1 {
                self.canopy_radius - 1
            } else {
                self.canopy_radius
            };
            for dx in -r..=r {
                for dz in -r..=r {
                    if dx * dx + dz * dz > r * r + 1 {
                        continue;
                    }
                    if dx == 0 && dz == 0 && dy <= 0 {
                        continue;
                    }
                    out.push((top.offset(dx, dy, dz), BlockType::Leaves));
                }
            }
        }
        out
    }
}

/// The tree rooted in column `(x, z)`, if any.
pub fn tree_at(generator: &TerrainGenerator, x: i32, z: i32) -> Option<Tree> {
    if near_spawn(x, z) {
        return None;
    }
    let column = generator.column(x, z);
    let density = column.biome.tree_density();
    if density <= 0.0 || column.height <= WATER_LEVEL {
        return None;
    }

    let mut rng = SmallRng::seed_from_u64(coord_hash(generator.seed(), x, 0, z));
    if !rng.gen_bool(density) {
        return None;
    }

    let surface = generator.block_in_column(&column, x, column.height, z);
    if !matches!(surface, BlockType::Grass | BlockType::Snow) {
        return None;
    }

    Some(Tree {
        base: BlockPos::new(x, column.height + 1, z),
        trunk_height: rng.gen_range(MIN_TRUNK..=MAX_TRUNK),
        canopy_radius: rng.gen_range(MIN_CANOPY..=MAX_CANOPY),
    })
}

fn near_spawn(x: i32, z: i32) -> bool {
    let (x, z) = (x as i64, z as i64);
    x * x + z * z <= SPAWN_CLEARANCE_SQ
}

/// Write every tree block that lands inside `chunk`. Leaves only fill air;
/// trunks may also replace leaves.
pub fn plant(generator: &TerrainGenerator, chunk: &mut Chunk) {
    let pos = chunk.pos();
    let origin = pos.origin();
    let lowest_tree_y = WATER_LEVEL + 1;
    // Tallest possible terrain plus trunk and canopy.
    if origin.y + CHUNK_SIZE <= lowest_tree_y || origin.y > 128 {
        return;
    }

    let margin = MAX_CANOPY;
    for x in origin.x - margin..origin.x + CHUNK_SIZE + margin {
        for z in origin.z - margin..origin.z + CHUNK_SIZE + margin {
            let Some(tree) = tree_at(generator, x, z) else {
                continue;
            };
            for (block_pos, block) in tree.blocks() {
                if block_pos.chunk() != pos {
                    continue;
                }
                let local = block_pos.local();
                let current = chunk.get(local);
                let replace = current.is_air()
                    || (block == BlockType::Wood && current == BlockType::Leaves);
                if replace {
                    chunk.set(local, block);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::position::ChunkPos;

    #[test]
    fn tree_shape() {
        let tree = Tree {
            base: BlockPos::new(10, 50, 10),
            trunk_height: 5,
            canopy_radius: 2,
        };
        let blocks = tree.blocks();
        let trunk: Vec<_> = blocks.iter().filter(|(_, b)| *b == BlockType::Wood).collect();
        assert_eq!(trunk.len(), 5);
        assert!(blocks.contains(&(BlockPos::new(10, 55, 10), BlockType::Leaves)));
        assert!(!blocks.contains(&(BlockPos::new(10, 54, 10), BlockType::Leaves)));
    }

    #[test]
    fn placement_is_repeatable() {
        let generator = TerrainGenerator::new(4242);
        for x in -200..-100 {
            assert_eq!(tree_at(&generator, x, 77), tree_at(&generator, x, 77));
        }
    }

    #[test]
    fn no_trees_at_spawn() {
        let generator = TerrainGenerator::new(12345);
        for x in -4..=4 {
            for z in -4..=4 {
                if near_spawn(x, z) {
                    assert!(tree_at(&generator, x, z).is_none());
                }
            }
        }
    }

    #[test]
    fn trees_stand_on_their_surface() {
        let generator = TerrainGenerator::new(31337);
        let found: Vec<Tree> = (-600..600)
            .step_by(3)
            .flat_map(|x| (-90..90).step_by(3).map(move |z| (x, z)))
            .filter_map(|(x, z)| tree_at(&generator, x, z))
            .take(5)
            .collect();
        for tree in found {
            assert_eq!(tree.base.y, generator.height_at(tree.base.x, tree.base.z) + 1);
            assert!((MIN_TRUNK..=MAX_TRUNK).contains(&tree.trunk_height));

            let chunk = generator.generate_chunk(tree.base.chunk());
            assert_eq!(chunk.get(tree.base.local()), BlockType::Wood);
        }
    }

    #[test]
    fn far_columns_do_not_overflow() {
        let generator = TerrainGenerator::new(12345);
        assert!(!near_spawn(50_000, -50_000));
        assert!(!near_spawn(i32::MAX, i32::MIN));
        for cy in 2..=5 {
            generator.generate_chunk(ChunkPos::new(3125, cy, 0));
            generator.generate_chunk(ChunkPos::new(-62_500, cy, 62_499));
        }
    }

    #[test]
    fn underground_chunks_are_untouched() {
        let generator = TerrainGenerator::new(1);
        let pos = ChunkPos::new(5, 0, 5);
        let chunk = generator.generate_chunk(pos);
        assert!(chunk.iter_solid().all(|(_, b)| b != BlockType::Leaves && b != BlockType::Wood));
    }
}
