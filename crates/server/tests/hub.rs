//! Hub behaviour driven in-process through its channel API: connection
//! lifecycle, relay rules and the distance filter.

use blockworld_engine::{BlockPos, BlockType};
use blockworld_protocol::{
    BlockEdit, ClientMessage, PlayerState, Rotation, ServerMessage, Vec3,
};
use blockworld_server::config::ServerConfig;
use blockworld_server::hub::{ConnectionPhase, Hub};
use tokio::sync::mpsc::Receiver;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hub() -> Hub {
    Hub::new(ServerConfig {
        view_distance: 64.0,
        ..ServerConfig::default()
    })
}

/// Everything currently queued for a connection.
fn drain(rx: &mut Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

fn place(x: i32, y: i32, z: i32, block: BlockType) -> ClientMessage {
    ClientMessage::BlockUpdate(BlockEdit {
        position: BlockPos::new(x, y, z),
        block_type: block,
    })
}

fn move_to(x: f32, y: f32, z: f32) -> ClientMessage {
    ClientMessage::PlayerUpdate(PlayerState {
        position: Vec3::new(x, y, z),
        rotation: Rotation::default(),
        selected_block: BlockType::Dirt,
    })
}

fn block_updates(msgs: &[ServerMessage]) -> Vec<(BlockPos, BlockType)> {
    msgs.iter()
        .filter_map(|m| match m {
            ServerMessage::BlockUpdate(u) => Some((u.position, u.block_type)),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initial_state_lists_only_other_players() {
    let hub = hub();
    let (a, mut rx_a) = hub.connect(None);
    let (b, mut rx_b) = hub.connect(None);

    let Some(ServerMessage::InitialState(initial)) = rx_b.recv().await else {
        panic!("expected initial_state first");
    };
    assert_eq!(initial.player_id, b);
    assert_eq!(initial.seed, Some(12345));
    assert_eq!(initial.spawn, Vec3::new(0.5, 50.0, 0.5));
    assert_eq!(initial.players.iter().map(|p| p.id).collect::<Vec<_>>(), vec![a]);

    let msgs = drain(&mut rx_a);
    assert!(matches!(msgs[0], ServerMessage::InitialState(ref s) if s.players.is_empty()));
    assert!(matches!(msgs[1], ServerMessage::Join(ref p) if p.id == b));
    assert_eq!(msgs.len(), 2);
    assert_eq!(hub.phase(a), ConnectionPhase::Open);
}

#[tokio::test]
async fn disconnect_announces_leave() {
    let hub = hub();
    let (a, mut rx_a) = hub.connect(None);
    let (b, _rx_b) = hub.connect(None);
    drain(&mut rx_a);

    hub.disconnect(b);
    hub.disconnect(b);
    assert_eq!(drain(&mut rx_a), vec![ServerMessage::Leave { id: b }]);
    assert_eq!(hub.phase(b), ConnectionPhase::Closed);
    assert_eq!(hub.connection_count(), 1);
    assert_eq!(hub.snapshot().players.len(), 1);

    // A closed connection's messages go nowhere.
    hub.handle_message(b, place(1, 50, 1, BlockType::Stone));
    assert!(hub.snapshot().blocks.is_empty());
    assert_eq!(hub.phase(a), ConnectionPhase::Open);
}

// ---------------------------------------------------------------------------
// Block updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn block_update_reaches_others_but_not_origin() {
    let hub = hub();
    let (a, mut rx_a) = hub.connect(None);
    let (b, mut rx_b) = hub.connect(None);
    drain(&mut rx_a);
    drain(&mut rx_b);

    hub.handle_message(a, place(3, 49, 3, BlockType::Planks));

    assert!(drain(&mut rx_a).is_empty());
    let Some(ServerMessage::BlockUpdate(update)) = rx_b.recv().await else {
        panic!("expected block_update");
    };
    assert_eq!(update.position, BlockPos::new(3, 49, 3));
    assert_eq!(update.block_type, BlockType::Planks);
    assert_eq!(update.player_id, Some(a));

    let snapshot = hub.snapshot();
    assert_eq!(snapshot.blocks.len(), 1);
    assert_eq!(snapshot.blocks[0].pos, BlockPos::new(3, 49, 3));
    assert_eq!(hub.updates(), vec![update]);
    assert_eq!(hub.phase(b), ConnectionPhase::Open);
}

#[tokio::test]
async fn distant_recipients_are_filtered() {
    let hub = hub();
    let (a, mut rx_a) = hub.connect(None);
    let (near, mut rx_near) = hub.connect(None);
    let (far, mut rx_far) = hub.connect(None);
    hub.handle_message(far, move_to(1000.0, 50.0, 0.0));
    hub.handle_message(near, move_to(10.0, 50.0, 10.0));
    drain(&mut rx_a);
    drain(&mut rx_near);
    drain(&mut rx_far);

    hub.handle_message(a, place(5, 48, 5, BlockType::Air));

    assert_eq!(
        block_updates(&drain(&mut rx_near)),
        vec![(BlockPos::new(5, 48, 5), BlockType::Air)]
    );
    assert!(drain(&mut rx_far).is_empty());
    assert_eq!(hub.stats().deliveries_filtered, 1);

    // The far player still sees it in the snapshot, air included.
    let snapshot = hub.snapshot();
    assert_eq!(snapshot.blocks[0].block, BlockType::Air);
}

#[tokio::test]
async fn movement_is_relayed_unfiltered() {
    let hub = hub();
    let (a, mut rx_a) = hub.connect(None);
    let (b, mut rx_b) = hub.connect(None);
    drain(&mut rx_a);
    drain(&mut rx_b);

    hub.handle_message(a, move_to(5000.0, 60.0, -5000.0));

    assert!(drain(&mut rx_a).is_empty());
    let msgs = drain(&mut rx_b);
    assert!(matches!(
        msgs.as_slice(),
        [ServerMessage::PlayerUpdate(p)] if p.id == a && p.position.x == 5000.0
    ));
    assert_eq!(hub.phase(b), ConnectionPhase::Open);
}

#[tokio::test]
async fn updates_arrive_in_application_order() {
    let hub = hub();
    let (a, _rx_a) = hub.connect(None);
    let (_b, mut rx_b) = hub.connect(None);
    drain(&mut rx_b);

    hub.handle_message(a, place(1, 50, 1, BlockType::Stone));
    hub.handle_message(a, place(1, 50, 1, BlockType::Glass));
    hub.handle_message(a, place(1, 50, 1, BlockType::Air));

    let msgs = drain(&mut rx_b);
    assert_eq!(
        block_updates(&msgs),
        vec![
            (BlockPos::new(1, 50, 1), BlockType::Stone),
            (BlockPos::new(1, 50, 1), BlockType::Glass),
            (BlockPos::new(1, 50, 1), BlockType::Air),
        ]
    );
    let stamps: Vec<u64> = msgs
        .iter()
        .filter_map(|m| match m {
            ServerMessage::BlockUpdate(u) => Some(u.timestamp),
            _ => None,
        })
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn late_joiner_does_not_replay_history() {
    let hub = hub();
    let (a, _rx_a) = hub.connect(None);
    hub.handle_message(a, place(2, 50, 2, BlockType::Wood));

    let (_b, mut rx_b) = hub.connect(None);
    let msgs = drain(&mut rx_b);
    assert!(block_updates(&msgs).is_empty());
    assert_eq!(hub.snapshot().blocks.len(), 1);
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_message_keeps_connection_open() {
    let hub = hub();
    let (a, _rx_a) = hub.connect(None);
    let (_b, mut rx_b) = hub.connect(None);
    drain(&mut rx_b);

    hub.handle_text(a, "{not json");
    hub.handle_text(a, r#"{"type":"block_update","data":{"position":{"x":1,"y":2,"z":3},"blockType":77}}"#);
    assert_eq!(hub.phase(a), ConnectionPhase::Open);
    assert!(drain(&mut rx_b).is_empty());

    hub.handle_text(
        a,
        r#"{"type":"block_update","data":{"position":{"x":1,"y":50,"z":3},"blockType":3}}"#,
    );
    assert_eq!(block_updates(&drain(&mut rx_b)).len(), 1);

    let stats = hub.stats();
    assert_eq!(stats.malformed_dropped, 2);
    assert_eq!(stats.messages_received, 3);
}

#[tokio::test]
async fn out_of_bounds_updates_are_dropped() {
    let hub = hub();
    let (a, _rx_a) = hub.connect(None);
    hub.handle_message(a, place(0, -5, 0, BlockType::Stone));
    hub.handle_message(a, place(2_000_000, 10, 0, BlockType::Stone));
    assert!(hub.snapshot().blocks.is_empty());
    assert_eq!(hub.stats().block_updates_rejected, 2);
}

#[tokio::test]
async fn update_log_is_capped() {
    let hub = Hub::new(ServerConfig {
        update_log_capacity: 2,
        ..ServerConfig::default()
    });
    let (a, _rx_a) = hub.connect(None);
    for x in 0..5 {
        hub.handle_message(a, place(x, 50, 0, BlockType::Dirt));
    }
    let log = hub.updates();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].position, BlockPos::new(4, 50, 0));
    assert_eq!(hub.snapshot().blocks.len(), 5);
}

#[tokio::test]
async fn full_queue_drops_instead_of_blocking() {
    let hub = Hub::new(ServerConfig {
        outbound_queue: 2,
        ..ServerConfig::default()
    });
    let (a, _rx_a) = hub.connect(None);
    let (_b, mut rx_b) = hub.connect(None);
    for x in 0..10 {
        hub.handle_message(a, place(x, 50, 0, BlockType::Dirt));
    }
    // initial_state plus one update fit; the rest were dropped.
    assert_eq!(drain(&mut rx_b).len(), 2);
    assert_eq!(hub.snapshot().blocks.len(), 10);
    assert!(hub.stats().deliveries_dropped >= 9);
}
