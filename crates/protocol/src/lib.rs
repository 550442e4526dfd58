//! Wire format between server and clients.
//!
//! Every frame on the persistent connection is a JSON object `{type, data}`.
//! The bulk snapshot is a plain JSON body served over HTTP.

pub mod message;
pub mod snapshot;

use std::time::{SystemTime, UNIX_EPOCH};

pub use message::{
    BlockEdit, BlockUpdate, ClientMessage, InitialState, PlayerSnapshot, PlayerState, Rotation,
    ServerMessage, Vec3,
};
pub use snapshot::{RateLimited, SnapshotBlock, WorldSnapshot};

/// Milliseconds since the Unix epoch, the unit of every `timestamp` field.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
