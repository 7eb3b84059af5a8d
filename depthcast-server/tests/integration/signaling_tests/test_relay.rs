use axum::extract::ws::Message;
use depthcast_core::{RoomId, SignalMessage};
use depthcast_server::SignalingRouter;
use serde_json::json;
use tokio::sync::mpsc;

use crate::integration::init_tracing;
use crate::utils::TestSocket;

#[tokio::test]
async fn test_offer_with_target_goes_only_to_target() {
    init_tracing();
    let router = SignalingRouter::new();
    let a = TestSocket::connect(&router);
    let mut b = TestSocket::connect(&router);
    let mut c = TestSocket::connect(&router);
    for socket in [&a, &b, &c] {
        router.join_room(socket.id, RoomId::default());
    }
    b.drain();
    c.drain();

    let offer = json!({"type": "offer", "sdp": "v=0", "target": b.id}).to_string();
    a.send(&router, &offer).await;

    match b.recv(500).await {
        Some(SignalMessage::Offer { sdp, sender, .. }) => {
            assert_eq!(sdp, "v=0");
            assert_eq!(sender, Some(a.id));
        }
        other => panic!("expected relayed offer, got {:?}", other),
    }
    assert!(c.drain().is_empty());
}

#[tokio::test]
async fn test_untargeted_candidate_broadcasts_to_room_except_sender() {
    init_tracing();
    let router = SignalingRouter::new();
    let mut a = TestSocket::connect(&router);
    let mut b = TestSocket::connect(&router);
    let mut outsider = TestSocket::connect(&router);
    let lab = RoomId::new("lab");
    router.join_room(a.id, lab.clone());
    router.join_room(b.id, lab.clone());
    router.join_room(outsider.id, RoomId::default());
    a.drain();
    b.drain();
    outsider.drain();

    let candidate = json!({
        "type": "ice_candidate",
        "room": "lab",
        "candidate": {"candidate": "candidate:1 1 udp 1 10.0.0.1 9 typ host", "sdpMid": "0"}
    })
    .to_string();
    a.send(&router, &candidate).await;

    assert!(matches!(
        b.recv(500).await,
        Some(SignalMessage::IceCandidate { sender: Some(id), .. }) if id == a.id
    ));
    assert!(a.drain().is_empty(), "sender must be excluded");
    assert!(outsider.drain().is_empty(), "non-members must not receive");
}

#[tokio::test]
async fn test_malformed_messages_are_dropped() {
    init_tracing();
    let router = SignalingRouter::new();
    let mut a = TestSocket::connect(&router);
    let b = TestSocket::connect(&router);
    router.join_room(a.id, RoomId::default());

    b.send(&router, "{not json").await;
    b.send(&router, r#"{"type":"teleport"}"#).await;
    b.send(&router, &json!({"type": "peer_joined", "peer_id": b.id}).to_string())
        .await;

    assert!(router.is_connected(&b.id));
    assert!(a.drain().is_empty());

    b.send(&router, r#"{"type":"join"}"#).await;
    assert_eq!(a.recv(500).await, Some(SignalMessage::PeerJoined { peer_id: b.id }));
}

#[tokio::test]
async fn test_broadcast_skips_excluded_and_survives_dead_member() {
    init_tracing();
    let router = SignalingRouter::new();
    let mut a = TestSocket::connect(&router);
    let mut b = TestSocket::connect(&router);

    let (dead_tx, dead_rx) = mpsc::unbounded_channel::<Message>();
    let dead = router.accept(dead_tx);
    drop(dead_rx);

    for id in [a.id, dead, b.id] {
        router.join_room(id, RoomId::default());
    }
    a.drain();
    b.drain();

    let delivered = router.broadcast_to_room(
        &RoomId::default(),
        &SignalMessage::PeerLeft { peer_id: dead },
        Some(a.id),
    );

    assert_eq!(delivered, 1);
    assert!(a.drain().is_empty());
    assert_eq!(b.drain(), vec![SignalMessage::PeerLeft { peer_id: dead }]);
}
