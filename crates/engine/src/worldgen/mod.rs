//! Deterministic terrain generation.
//!
//! `TerrainGenerator::block_at` is a pure function of the coordinates and the
//! seed: the server and every client compute identical terrain, so only edits
//! ever cross the network. Tree placement (`trees`) is a cosmetic second pass.

pub mod biome;
pub mod trees;

use noise::{NoiseFn, Perlin};

use crate::world::block::BlockType;
use crate::world::chunk::{Chunk, CHUNK_VOLUME};
use crate::world::position::{ChunkPos, LocalPos, CHUNK_SIZE};

pub use biome::Biome;

pub const WATER_LEVEL: i32 = 40;
/// Surface height of the flattened area around the origin.
pub const SPAWN_HEIGHT: i32 = 48;
/// Player spawn point, standing on the spawn plateau.
pub const SPAWN_POINT: [f32; 3] = [0.5, 50.0, 0.5];

const SPAWN_FLAT_RADIUS: f64 = 8.0;
const SPAWN_BLEND_WIDTH: f64 = 16.0;

const BIOME_FREQUENCY: f64 = 0.0025;
const HEIGHT_OCTAVES: u32 = 4;
const HEIGHT_FREQUENCY: f64 = 0.01;
const HEIGHT_LACUNARITY: f64 = 2.0;
const HEIGHT_PERSISTENCE: f64 = 0.5;

const SUBSURFACE_DEPTH: i32 = 3;
const CAVE_FREQUENCY: f64 = 0.06;
const CAVE_THRESHOLD: f64 = 0.45;
const CAVE_MIN_DEPTH: i32 = 5;
const OUTCROP_CHANCE: f64 = 0.1;

/// One ore vein layer. Earlier entries win when several match.
#[derive(Debug, Clone, Copy)]
pub struct OreConfig {
    pub block: BlockType,
    pub min_y: i32,
    pub max_y: i32,
    pub scale: f64,
    pub threshold: f64,
}

pub const ORES: [OreConfig; 3] = [
    OreConfig {
        block: BlockType::CoalOre,
        min_y: 1,
        max_y: 80,
        scale: 0.11,
        threshold: 0.55,
    },
    OreConfig {
        block: BlockType::IronOre,
        min_y: 1,
        max_y: 48,
        scale: 0.13,
        threshold: 0.6,
    },
    OreConfig {
        block: BlockType::GoldOre,
        min_y: 1,
        max_y: 28,
        scale: 0.17,
        threshold: 0.65,
    },
];

/// Biome and surface height of one `(x, z)` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub biome: Biome,
    pub height: i32,
}

pub struct TerrainGenerator {
    seed: u32,
    biome_noise: Perlin,
    height_noise: Perlin,
    cave_noise: Perlin,
    ore_noise: [Perlin; ORES.len()],
}

impl TerrainGenerator {
    pub fn new(seed: u32) -> Self {
        let field = |offset: u32| Perlin::new(seed.wrapping_add(offset));
        Self {
            seed,
            height_noise: field(0),
            biome_noise: field(1),
            cave_noise: field(2),
            ore_noise: [field(10), field(11), field(12)],
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn biome_at(&self, x: i32, z: i32) -> Biome {
        let value = self
            .biome_noise
            .get([x as f64 * BIOME_FREQUENCY, z as f64 * BIOME_FREQUENCY]);
        Biome::classify(value)
    }

    /// Octave sum normalised to roughly [-1, 1].
    fn height_noise(&self, x: i32, z: i32) -> f64 {
        let mut sum = 0.0;
        let mut norm = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = HEIGHT_FREQUENCY;
        for _ in 0..HEIGHT_OCTAVES {
            sum += amplitude
                * self
                    .height_noise
                    .get([x as f64 * frequency, z as f64 * frequency]);
            norm += amplitude;
            amplitude *= HEIGHT_PERSISTENCE;
            frequency *= HEIGHT_LACUNARITY;
        }
        sum / norm
    }

    pub fn column(&self, x: i32, z: i32) -> Column {
        let biome = self.biome_at(x, z);
        let (base, scale) = biome.height_params();
        let natural = base + self.height_noise(x, z) * scale;

        let dist = ((x as f64).powi(2) + (z as f64).powi(2)).sqrt();
        let spawn = SPAWN_HEIGHT as f64;
        let height = if dist <= SPAWN_FLAT_RADIUS {
            spawn
        } else if dist < SPAWN_FLAT_RADIUS + SPAWN_BLEND_WIDTH {
            let t = (dist - SPAWN_FLAT_RADIUS) / SPAWN_BLEND_WIDTH;
            spawn + (natural - spawn) * t
        } else {
            natural
        };

        Column {
            biome,
            height: height.floor() as i32,
        }
    }

    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        self.column(x, z).height
    }

    /// The generated block at a world position, before trees and edits.
    pub fn block_at(&self, x: i32, y: i32, z: i32) -> BlockType {
        self.block_in_column(&self.column(x, z), x, y, z)
    }

    /// Same as [`block_at`](Self::block_at) with the column precomputed.
    pub fn block_in_column(&self, column: &Column, x: i32, y: i32, z: i32) -> BlockType {
        let height = column.height;

        if y > height {
            return if y <= WATER_LEVEL {
                BlockType::Water
            } else {
                BlockType::Air
            };
        }

        if y == height {
            if column.biome == Biome::Mountains
                && unit(coord_hash(self.seed, x, y, z)) < OUTCROP_CHANCE
            {
                return BlockType::Stone;
            }
            return column.biome.surface();
        }

        let depth = height - y;
        if depth <= SUBSURFACE_DEPTH {
            return column.biome.subsurface();
        }

        if depth >= CAVE_MIN_DEPTH {
            let f = CAVE_FREQUENCY;
            let cave = self
                .cave_noise
                .get([x as f64 * f, y as f64 * f, z as f64 * f]);
            if cave > CAVE_THRESHOLD {
                return BlockType::Air;
            }
        }

        for (ore, noise) in ORES.iter().zip(&self.ore_noise) {
            if y < ore.min_y || y > ore.max_y {
                continue;
            }
            let s = ore.scale;
            if noise.get([x as f64 * s, y as f64 * s, z as f64 * s]) > ore.threshold {
                return ore.block;
            }
        }

        BlockType::Stone
    }

    /// Fill a whole chunk: primary terrain, then trees.
    pub fn generate_chunk(&self, pos: ChunkPos) -> Chunk {
        let origin = pos.origin();
        let mut blocks = Box::new([BlockType::Air; CHUNK_VOLUME]);

        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let (wx, wz) = (origin.x + x, origin.z + z);
                let column = self.column(wx, wz);
                for y in 0..CHUNK_SIZE {
                    let local = LocalPos::new(x as u8, y as u8, z as u8);
                    blocks[Chunk::index(local)] =
                        self.block_in_column(&column, wx, origin.y + y, wz);
                }
            }
        }

        let mut chunk = Chunk::from_blocks(pos, blocks);
        trees::plant(self, &mut chunk);
        chunk
    }
}

/// Stateless 64-bit hash of a seeded coordinate triple.
pub fn coord_hash(seed: u32, x: i32, y: i32, z: i32) -> u64 {
    let mut h = splitmix64(seed as u64);
    for v in [x, y, z] {
        h = splitmix64(h ^ (v as u32 as u64));
    }
    h
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Map a hash to `[0, 1)`.
pub fn unit(hash: u64) -> f64 {
    (hash >> 11) as f64 / (1u64 << 53) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_terrain() {
        let a = TerrainGenerator::new(12345);
        let b = TerrainGenerator::new(12345);
        for x in (-300..300).step_by(7) {
            for z in (-300..300).step_by(11) {
                assert_eq!(a.column(x, z), b.column(x, z));
                for y in (0..90).step_by(3) {
                    assert_eq!(a.block_at(x, y, z), a.block_at(x, y, z));
                    assert_eq!(a.block_at(x, y, z), b.block_at(x, y, z));
                }
            }
        }
    }

    #[test]
    fn spawn_column_is_solid_at_spawn_height() {
        let generator = TerrainGenerator::new(12345);
        assert_eq!(generator.height_at(0, 0), SPAWN_HEIGHT);
        let surface = generator.block_at(0, 48, 0);
        assert!(surface.is_solid(), "got {surface}");
        assert_ne!(surface, BlockType::Water);
        assert_eq!(generator.block_at(0, 49, 0), BlockType::Air);
    }

    #[test]
    fn column_layers_follow_height() {
        let generator = TerrainGenerator::new(7);
        for (x, z) in [(100, -40), (-250, 333), (512, 512)] {
            let column = generator.column(x, z);
            let h = column.height;
            let top = generator.block_at(x, h, z);
            assert!(top == column.biome.surface() || top == BlockType::Stone);
            for d in 1..=SUBSURFACE_DEPTH {
                assert_eq!(generator.block_at(x, h - d, z), column.biome.subsurface());
            }
            let above = generator.block_at(x, h + 1, z);
            if h + 1 <= WATER_LEVEL {
                assert_eq!(above, BlockType::Water);
            } else {
                assert_eq!(above, BlockType::Air);
            }
        }
    }

    #[test]
    fn generated_chunk_matches_block_at_below_trees() {
        let generator = TerrainGenerator::new(99);
        let pos = ChunkPos::new(3, 1, -2);
        let chunk = generator.generate_chunk(pos);
        let origin = pos.origin();
        for (x, y, z) in [(0, 0, 0), (15, 15, 15), (7, 3, 9)] {
            let world = origin.offset(x, y, z);
            let expected = generator.block_at(world.x, world.y, world.z);
            let got = chunk.get(LocalPos::new(x as u8, y as u8, z as u8));
            // Trees only ever replace air.
            if expected != BlockType::Air {
                assert_eq!(got, expected);
            }
        }
    }

    #[test]
    fn different_seeds_differ_somewhere() {
        let a = TerrainGenerator::new(1);
        let b = TerrainGenerator::new(2);
        let differs = (0..200).any(|i| a.column(i * 37 + 100, i * 13 - 900) != b.column(i * 37 + 100, i * 13 - 900));
        assert!(differs);
    }

    #[test]
    fn unit_hash_is_in_range() {
        for i in 0..1000 {
            let u = unit(coord_hash(5, i, -i, i * 3));
            assert!((0.0..1.0).contains(&u));
        }
    }
}
