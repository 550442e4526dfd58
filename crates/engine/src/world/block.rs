//! Block kinds and their static properties.
//!
//! `BlockType` is a plain `u8`-backed enum; everything per-kind (physics flags,
//! atlas tiles) lives in one immutable table indexed by the discriminant, so
//! the meshing loop does a bounds-checked array read instead of dispatch.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A block kind. The discriminant is the wire id.
///
/// `Air` is always 0: it is never solid, always transparent, and a chunk
/// created empty is all air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum BlockType {
    #[default]
    Air = 0,
    Grass = 1,
    Dirt = 2,
    Stone = 3,
    Sand = 4,
    Sandstone = 5,
    Snow = 6,
    Water = 7,
    Wood = 8,
    Leaves = 9,
    CoalOre = 10,
    IronOre = 11,
    GoldOre = 12,
    Cobblestone = 13,
    Planks = 14,
    Glass = 15,
}

impl BlockType {
    pub const ALL: [BlockType; 16] = [
        BlockType::Air,
        BlockType::Grass,
        BlockType::Dirt,
        BlockType::Stone,
        BlockType::Sand,
        BlockType::Sandstone,
        BlockType::Snow,
        BlockType::Water,
        BlockType::Wood,
        BlockType::Leaves,
        BlockType::CoalOre,
        BlockType::IronOre,
        BlockType::GoldOre,
        BlockType::Cobblestone,
        BlockType::Planks,
        BlockType::Glass,
    ];

    #[inline]
    pub const fn id(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn data(self) -> &'static BlockData {
        &BLOCK_DATA[self as usize]
    }

    #[inline]
    pub fn is_air(self) -> bool {
        self == BlockType::Air
    }

    #[inline]
    pub fn is_solid(self) -> bool {
        self.data().solid
    }

    #[inline]
    pub fn is_transparent(self) -> bool {
        self.data().transparent
    }

    #[inline]
    pub fn is_liquid(self) -> bool {
        self.data().liquid
    }

    /// Whether a ray stops at this block. Air and liquids are passed through.
    #[inline]
    pub fn is_targetable(self) -> bool {
        !self.is_air() && !self.is_liquid()
    }

    pub fn name(self) -> &'static str {
        self.data().name
    }
}

impl From<BlockType> for u8 {
    fn from(block: BlockType) -> u8 {
        block.id()
    }
}

impl TryFrom<u8> for BlockType {
    type Error = UnknownBlock;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        BlockType::ALL
            .get(id as usize)
            .copied()
            .ok_or(UnknownBlock(id as i64))
    }
}

impl TryFrom<i64> for BlockType {
    type Error = UnknownBlock;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        u8::try_from(id)
            .map_err(|_| UnknownBlock(id))
            .and_then(BlockType::try_from)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A block id with no registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownBlock(pub i64);

impl fmt::Display for UnknownBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown block type id {}", self.0)
    }
}

impl std::error::Error for UnknownBlock {}

/// Atlas tile index for each face of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceTextures {
    pub top: u16,
    pub bottom: u16,
    pub left: u16,
    pub right: u16,
    pub front: u16,
    pub back: u16,
}

impl FaceTextures {
    const fn all(tile: u16) -> Self {
        Self {
            top: tile,
            bottom: tile,
            left: tile,
            right: tile,
            front: tile,
            back: tile,
        }
    }

    const fn column(top: u16, bottom: u16, side: u16) -> Self {
        Self {
            top,
            bottom,
            left: side,
            right: side,
            front: side,
            back: side,
        }
    }
}

/// Static properties of one block kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockData {
    pub name: &'static str,
    pub solid: bool,
    pub transparent: bool,
    pub liquid: bool,
    /// Seconds to mine by hand. Consumed by the player-logic layer.
    pub hardness: f32,
    pub textures: FaceTextures,
}

const fn opaque(name: &'static str, hardness: f32, textures: FaceTextures) -> BlockData {
    BlockData {
        name,
        solid: true,
        transparent: false,
        liquid: false,
        hardness,
        textures,
    }
}

// Indexed by `BlockType as usize`; order must match the enum.
static BLOCK_DATA: [BlockData; 16] = [
    BlockData {
        name: "air",
        solid: false,
        transparent: true,
        liquid: false,
        hardness: 0.0,
        textures: FaceTextures::all(0),
    },
    opaque("grass", 0.6, FaceTextures::column(0, 2, 3)),
    opaque("dirt", 0.5, FaceTextures::all(2)),
    opaque("stone", 1.5, FaceTextures::all(1)),
    opaque("sand", 0.5, FaceTextures::all(18)),
    opaque("sandstone", 0.8, FaceTextures::column(176, 208, 192)),
    opaque("snow", 0.2, FaceTextures::column(66, 2, 68)),
    BlockData {
        name: "water",
        solid: false,
        transparent: true,
        liquid: true,
        hardness: 100.0,
        textures: FaceTextures::all(205),
    },
    opaque("wood", 2.0, FaceTextures::column(21, 21, 20)),
    BlockData {
        name: "leaves",
        solid: true,
        transparent: true,
        liquid: false,
        hardness: 0.2,
        textures: FaceTextures::all(52),
    },
    opaque("coal_ore", 3.0, FaceTextures::all(34)),
    opaque("iron_ore", 3.0, FaceTextures::all(33)),
    opaque("gold_ore", 3.0, FaceTextures::all(32)),
    opaque("cobblestone", 2.0, FaceTextures::all(16)),
    opaque("planks", 2.0, FaceTextures::all(4)),
    BlockData {
        name: "glass",
        solid: true,
        transparent: true,
        liquid: false,
        hardness: 0.3,
        textures: FaceTextures::all(49),
    },
];

/// Tiles per row and column of the square texture atlas.
pub const ATLAS_TILES: u16 = 16;

/// Normalised `[u_min, v_min, u_max, v_max]` rectangle of an atlas tile.
pub fn atlas_rect(tile: u16) -> [f32; 4] {
    let col = (tile % ATLAS_TILES) as f32;
    let row = (tile / ATLAS_TILES) as f32;
    let step = 1.0 / ATLAS_TILES as f32;
    [col * step, row * step, (col + 1.0) * step, (row + 1.0) * step]
}
