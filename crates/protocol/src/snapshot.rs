//! The bulk world snapshot served by `GET /api/world-state`.
//!
//! Blocks go out in the compact `[x, y, z, blockType]` form. Older peers send
//! `{x, y, z, blockType}` or `{position: {x, y, z}, blockType}` objects, so
//! decoding accepts all three.

use blockworld_engine::{BlockPos, BlockType};
use serde::{Deserialize, Serialize};

use crate::message::PlayerSnapshot;

/// One overlay entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BlockRepr", into = "(i32, i32, i32, BlockType)")]
pub struct SnapshotBlock {
    pub pos: BlockPos,
    pub block: BlockType,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BlockRepr {
    Compact(i32, i32, i32, BlockType),
    Flat {
        x: i32,
        y: i32,
        z: i32,
        #[serde(rename = "blockType")]
        block_type: BlockType,
    },
    Nested {
        position: BlockPos,
        #[serde(rename = "blockType")]
        block_type: BlockType,
    },
}

impl From<BlockRepr> for SnapshotBlock {
    fn from(repr: BlockRepr) -> Self {
        let (pos, block) = match repr {
            BlockRepr::Compact(x, y, z, block) => (BlockPos::new(x, y, z), block),
            BlockRepr::Flat { x, y, z, block_type } => (BlockPos::new(x, y, z), block_type),
            BlockRepr::Nested {
                position,
                block_type,
            } => (position, block_type),
        };
        Self { pos, block }
    }
}

impl From<SnapshotBlock> for (i32, i32, i32, BlockType) {
    fn from(b: SnapshotBlock) -> Self {
        (b.pos.x, b.pos.y, b.pos.z, b.block)
    }
}

impl From<(BlockPos, BlockType)> for SnapshotBlock {
    fn from((pos, block): (BlockPos, BlockType)) -> Self {
        Self { pos, block }
    }
}

/// The whole authoritative overlay plus the current player list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub blocks: Vec<SnapshotBlock>,
    #[serde(default)]
    pub players: Vec<PlayerSnapshot>,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
}

impl WorldSnapshot {
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// The blocks as `(position, type)` pairs, ready for `World::apply_snapshot`.
    pub fn block_pairs(&self) -> impl Iterator<Item = (BlockPos, BlockType)> + '_ {
        self.blocks.iter().map(|b| (b.pos, b.block))
    }
}

/// Body of a `429` from the snapshot endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimited {
    pub error: String,
    pub retry_after_ms: u64,
}

impl RateLimited {
    pub fn new(retry_after_ms: u64) -> Self {
        Self {
            error: "Too many requests".into(),
            retry_after_ms,
        }
    }
}
