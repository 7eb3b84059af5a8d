use depthcast_core::ClientId;
use serde_json::{Value, json};
use std::time::Duration;

use crate::integration::{create_test_manager, init_tracing};
use crate::utils::{TEST_OFFER, TransportCall};

fn added_candidates(calls: Vec<TransportCall>) -> Vec<Value> {
    calls
        .into_iter()
        .filter_map(|c| match c {
            TransportCall::AddIce(json) => Some(serde_json::from_str(&json).unwrap()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_candidate_without_session_is_dropped() {
    init_tracing();
    let mut t = create_test_manager(Duration::from_secs(30)).await;

    t.manager
        .handle_ice_candidate(ClientId::new(), json!({"candidate": "candidate:1"}))
        .await;

    assert!(t.factory.created().is_empty());
}

#[tokio::test]
async fn test_candidate_object_is_passed_through() {
    init_tracing();
    let mut t = create_test_manager(Duration::from_secs(30)).await;
    let client = ClientId::new();
    t.manager.handle_offer(client, TEST_OFFER.into()).await.unwrap();

    let candidate = json!({
        "candidate": "candidate:1 1 udp 2122252543 192.168.1.20 50000 typ host",
        "sdpMid": "0",
        "sdpMLineIndex": 0
    });
    t.manager
        .handle_ice_candidate(client, candidate.clone())
        .await;

    let calls = t.factory.latest_for(&client).unwrap().calls();
    assert_eq!(added_candidates(calls), vec![candidate]);
}

#[tokio::test]
async fn test_bare_candidate_string_is_accepted() {
    init_tracing();
    let mut t = create_test_manager(Duration::from_secs(30)).await;
    let client = ClientId::new();
    t.manager.handle_offer(client, TEST_OFFER.into()).await.unwrap();

    t.manager
        .handle_ice_candidate(client, json!("candidate:2 1 udp 1 10.0.0.5 9 typ host"))
        .await;
    t.manager.handle_ice_candidate(client, json!(17)).await;

    let added = added_candidates(t.factory.latest_for(&client).unwrap().calls());
    assert_eq!(added.len(), 1);
    assert_eq!(added[0]["candidate"], "candidate:2 1 udp 1 10.0.0.5 9 typ host");
}
