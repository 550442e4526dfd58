//! Voxel world engine: chunked block storage, deterministic terrain, visible
//! face meshing and ray queries. No I/O; the network layers live in the
//! `blockworld-server` and `blockworld-client` crates.

pub mod world;
pub mod worldgen;

pub use world::block::BlockType;
pub use world::position::{BlockPos, ChunkPos, LocalPos, CHUNK_SIZE};
pub use world::{BlockChange, Origin, World, WorldConfig};
pub use worldgen::TerrainGenerator;
