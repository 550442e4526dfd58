use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of blocks along each axis of a chunk.
pub const CHUNK_SIZE: i32 = 16;

/// Absolute block position in the world. Serializes as `{x, y, z}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The block containing a point in continuous space.
    pub fn containing(point: [f32; 3]) -> Self {
        Self::new(
            point[0].floor() as i32,
            point[1].floor() as i32,
            point[2].floor() as i32,
        )
    }

    /// Rebuild a world position from its chunk and local parts.
    pub const fn from_parts(chunk: ChunkPos, local: LocalPos) -> Self {
        let origin = chunk.origin();
        Self::new(
            origin.x + local.x as i32,
            origin.y + local.y as i32,
            origin.z + local.z as i32,
        )
    }

    /// The chunk this block belongs to.
    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: self.x.div_euclid(CHUNK_SIZE),
            y: self.y.div_euclid(CHUNK_SIZE),
            z: self.z.div_euclid(CHUNK_SIZE),
        }
    }

    /// Position within the chunk; every component is in `0..CHUNK_SIZE`.
    pub const fn local(&self) -> LocalPos {
        LocalPos {
            x: self.x.rem_euclid(CHUNK_SIZE) as u8,
            y: self.y.rem_euclid(CHUNK_SIZE) as u8,
            z: self.z.rem_euclid(CHUNK_SIZE) as u8,
        }
    }

    pub const fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The centre of the block in continuous space.
    pub fn center(&self) -> [f32; 3] {
        [
            self.x as f32 + 0.5,
            self.y as f32 + 0.5,
            self.z as f32 + 0.5,
        ]
    }

    /// The six face-adjacent neighbors.
    pub const fn neighbors(&self) -> [BlockPos; 6] {
        [
            self.offset(1, 0, 0),
            self.offset(-1, 0, 0),
            self.offset(0, 1, 0),
            self.offset(0, -1, 0),
            self.offset(0, 0, 1),
            self.offset(0, 0, -1),
        ]
    }
}

/// `"x,y,z"`, the key format of the authoritative overlay.
impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePosError(String);

impl fmt::Display for ParsePosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid position key {:?}", self.0)
    }
}

impl std::error::Error for ParsePosError {}

impl FromStr for BlockPos {
    type Err = ParsePosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',').map(|p| p.trim().parse::<i32>());
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(x)), Some(Ok(y)), Some(Ok(z)), None) => Ok(Self::new(x, y, z)),
            _ => Err(ParsePosError(s.to_string())),
        }
    }
}

/// Chunk position in chunk space (each chunk is 16x16x16 blocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The lowest-corner block of this chunk.
    pub const fn origin(&self) -> BlockPos {
        BlockPos::new(
            self.x * CHUNK_SIZE,
            self.y * CHUNK_SIZE,
            self.z * CHUNK_SIZE,
        )
    }

    pub const fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Squared distance to `other` in the X/Z plane, in chunk units.
    pub const fn planar_distance_sq(&self, other: ChunkPos) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dz * dz
    }
}

/// Block position local to a chunk (each component in `0..CHUNK_SIZE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl LocalPos {
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        Self { x, y, z }
    }

    /// For each axis, which neighboring chunk offsets share this block's
    /// boundary: `-1` on the low face, `1` on the high face, none inside.
    pub fn boundary_offsets(&self) -> [Option<i32>; 3] {
        let edge = |v: u8| match v {
            0 => Some(-1),
            v if v as i32 == CHUNK_SIZE - 1 => Some(1),
            _ => None,
        };
        [edge(self.x), edge(self.y), edge(self.z)]
    }
}
