//! Messages on the persistent connection.

use blockworld_engine::{BlockPos, BlockType};
use serde::{Deserialize, Serialize};

/// A point in continuous world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: Vec3) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<BlockPos> for Vec3 {
    /// The block's center.
    fn from(pos: BlockPos) -> Self {
        pos.center().into()
    }
}

/// Camera orientation in radians: `x` is pitch, `y` is yaw.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub x: f32,
    pub y: f32,
}

/// What a client reports about itself on every movement heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub selected_block: BlockType,
}

/// A player as other peers see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: u64,
    #[serde(default)]
    pub username: String,
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub selected_block: BlockType,
}

/// A locally authored mutation, as sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEdit {
    pub position: BlockPos,
    pub block_type: BlockType,
}

/// A mutation as applied by the server. Also the entry type of the update log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockUpdate {
    pub position: BlockPos,
    pub block_type: BlockType,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<u64>,
}

/// Personalized greeting sent once a connection opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialState {
    pub player_id: u64,
    /// Everyone else; never the recipient itself.
    pub players: Vec<PlayerSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u32>,
    #[serde(default)]
    pub spawn: Vec3,
    pub timestamp: u64,
}

/// Client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    PlayerUpdate(PlayerState),
    BlockUpdate(BlockEdit),
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    InitialState(InitialState),
    Join(PlayerSnapshot),
    Leave { id: u64 },
    PlayerUpdate(PlayerSnapshot),
    BlockUpdate(BlockUpdate),
}

impl ClientMessage {
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl ServerMessage {
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::InitialState(_) => "initial_state",
            ServerMessage::Join(_) => "join",
            ServerMessage::Leave { .. } => "leave",
            ServerMessage::PlayerUpdate(_) => "player_update",
            ServerMessage::BlockUpdate(_) => "block_update",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_update_wire_shape() {
        let msg = ServerMessage::BlockUpdate(BlockUpdate {
            position: BlockPos::new(16, 10, -3),
            block_type: BlockType::Planks,
            timestamp: 1_700_000_000_000,
            player_id: Some(7),
        });
        let value: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "block_update",
                "data": {
                    "position": {"x": 16, "y": 10, "z": -3},
                    "blockType": 14,
                    "timestamp": 1_700_000_000_000u64,
                    "playerId": 7
                }
            })
        );
    }

    #[test]
    fn player_id_is_optional() {
        let text = r#"{"type":"block_update","data":{"position":{"x":1,"y":2,"z":3},"blockType":3,"timestamp":5}}"#;
        let ServerMessage::BlockUpdate(update) = ServerMessage::decode(text).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(update.player_id, None);
        assert_eq!(update.block_type, BlockType::Stone);
    }

    #[test]
    fn leave_carries_only_the_id() {
        let text = ServerMessage::Leave { id: 3 }.encode().unwrap();
        assert_eq!(text, r#"{"type":"leave","data":{"id":3}}"#);
    }

    #[test]
    fn client_messages_decode() {
        let text = r#"{"type":"player_update","data":{"position":{"x":0.5,"y":50,"z":0.5},"rotation":{"x":0.1,"y":1.2},"selectedBlock":13}}"#;
        let ClientMessage::PlayerUpdate(state) = ClientMessage::decode(text).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(state.selected_block, BlockType::Cobblestone);
        assert_eq!(state.position, Vec3::new(0.5, 50.0, 0.5));

        let text = r#"{"type":"block_update","data":{"position":{"x":4,"y":5,"z":6},"blockType":0}}"#;
        assert_eq!(
            ClientMessage::decode(text).unwrap(),
            ClientMessage::BlockUpdate(BlockEdit {
                position: BlockPos::new(4, 5, 6),
                block_type: BlockType::Air,
            })
        );
    }

    #[test]
    fn malformed_messages_are_errors() {
        for text in [
            "not json",
            r#"{"type":"teleport","data":{}}"#,
            r#"{"type":"block_update","data":{"position":{"x":1,"y":2},"blockType":1}}"#,
            r#"{"type":"block_update","data":{"position":{"x":1,"y":2,"z":3},"blockType":99}}"#,
        ] {
            assert!(ClientMessage::decode(text).is_err(), "{text}");
        }
    }

    #[test]
    fn initial_state_round_trips() {
        let msg = ServerMessage::InitialState(InitialState {
            player_id: 2,
            players: vec![PlayerSnapshot {
                id: 1,
                username: "Player1".into(),
                position: Vec3::new(1.0, 50.0, 2.0),
                rotation: Rotation::default(),
                selected_block: BlockType::Grass,
            }],
            seed: Some(12345),
            spawn: Vec3::new(0.5, 50.0, 0.5),
            timestamp: 10,
        });
        assert_eq!(ServerMessage::decode(&msg.encode().unwrap()).unwrap(), msg);
        assert_eq!(msg.kind(), "initial_state");
    }
}
