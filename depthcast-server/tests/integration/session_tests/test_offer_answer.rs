use depthcast_core::ClientId;
use depthcast_server::{ConnectionState, MediaDirection, SessionCommand, SessionState};
use std::time::Duration;

use crate::integration::{create_test_manager, init_tracing};
use crate::utils::{TEST_OFFER, TransportCall};

#[tokio::test]
async fn test_offer_produces_finalized_answer() {
    init_tracing();
    let mut t = create_test_manager(Duration::from_secs(30)).await;
    let client = ClientId::new();

    let answer = t
        .manager
        .handle_offer(client, TEST_OFFER.to_string())
        .await
        .expect("negotiation failed");

    assert!(answer.contains("a=end-of-candidates"));
    assert_eq!(t.manager.session_state(&client), Some(SessionState::AnswerSent));
    assert_eq!(t.producer.subscriber_count(), 1);

    let transport = t.factory.latest_for(&client).unwrap();
    assert_eq!(
        transport.calls(),
        vec![
            TransportCall::SetRemote(TEST_OFFER.to_string()),
            TransportCall::AddMedia,
            TransportCall::SetDirection(0, MediaDirection::SendRecv),
            TransportCall::CreateAnswer,
            TransportCall::SetLocal(format!("v=0 answer {} 0", client)),
            TransportCall::CreateDataChannel("controls".into()),
        ]
    );
    assert!(!transport.directions().contains(&MediaDirection::Unset));
}

#[tokio::test]
async fn test_answer_is_sent_through_signaling() {
    init_tracing();
    let mut t = create_test_manager(Duration::from_secs(30)).await;
    let client = ClientId::new();

    let answer = t.manager.handle_offer(client, TEST_OFFER.into()).await.unwrap();

    let sent = t.answers.recv().await.unwrap();
    assert_eq!(sent.client_id, client);
    assert_eq!(sent.sdp, answer);
    assert_eq!(t.signaling.answer_count().await, 1);
}

#[tokio::test]
async fn test_session_exists_while_negotiating() {
    init_tracing();
    let mut t = create_test_manager(Duration::from_secs(30)).await;
    t.factory.delay_local_description(Duration::from_secs(5));
    let client = ClientId::new();

    t.manager
        .handle_command(SessionCommand::Offer {
            client_id: client,
            sdp: TEST_OFFER.to_string(),
        })
        .await;

    assert_eq!(t.manager.session_state(&client), Some(SessionState::Created));
    assert_eq!(t.producer.subscriber_count(), 1);
    assert_eq!(t.signaling.answer_count().await, 0);

    assert!(t.manager.remove(&client).await);
    assert!(t.factory.latest_for(&client).unwrap().was_closed());
    assert_eq!(t.producer.subscriber_count(), 0);
}

#[tokio::test]
async fn test_connected_notification_advances_state() {
    init_tracing();
    let mut t = create_test_manager(Duration::from_secs(30)).await;
    let client = ClientId::new();
    t.manager.handle_offer(client, TEST_OFFER.into()).await.unwrap();
    let transport = t.factory.latest_for(&client).unwrap();

    transport.emit_state(ConnectionState::Connecting).await;
    transport.emit_state(ConnectionState::Connected).await;
    t.manager.drain_transport_events().await;

    assert_eq!(t.manager.session_state(&client), Some(SessionState::Connected));
}

#[tokio::test]
async fn test_renegotiation_replaces_previous_session() {
    init_tracing();
    let mut t = create_test_manager(Duration::from_secs(30)).await;
    let client = ClientId::new();

    t.manager.handle_offer(client, TEST_OFFER.into()).await.unwrap();
    let first = t.factory.latest_for(&client).unwrap();
    t.manager.handle_offer(client, TEST_OFFER.into()).await.unwrap();
    let second = t.factory.latest_for(&client).unwrap();

    assert!(first.was_closed());
    assert!(!second.was_closed());
    assert_eq!(second.generation, first.generation + 1);
    assert_eq!(t.manager.active_sessions(), vec![client]);
    assert_eq!(t.producer.subscriber_count(), 1);

    // The replaced transport's late failure must not touch the new session.
    first.emit_state(ConnectionState::Failed).await;
    t.manager.drain_transport_events().await;
    assert_eq!(t.manager.session_state(&client), Some(SessionState::AnswerSent));
}

#[tokio::test]
async fn test_malformed_offer_leaves_no_session() {
    init_tracing();
    let mut t = create_test_manager(Duration::from_secs(30)).await;
    let client = ClientId::new();

    let result = t.manager.handle_offer(client, "garbage".into()).await;

    assert!(result.is_err());
    assert!(t.manager.session_state(&client).is_none());
    assert!(t.factory.latest_for(&client).unwrap().was_closed());
    assert_eq!(t.producer.subscriber_count(), 0);
    assert_eq!(t.signaling.answer_count().await, 0);
}

#[tokio::test]
async fn test_answer_without_session_is_ignored() {
    init_tracing();
    let mut t = create_test_manager(Duration::from_secs(30)).await;
    let stranger = ClientId::new();

    t.manager.handle_answer(stranger, "v=0".into()).await;

    assert!(t.factory.created().is_empty());
}

#[tokio::test]
async fn test_answer_applies_to_existing_session() {
    init_tracing();
    let mut t = create_test_manager(Duration::from_secs(30)).await;
    let client = ClientId::new();
    t.manager.handle_offer(client, TEST_OFFER.into()).await.unwrap();

    t.manager.handle_answer(client, "v=0 remote".into()).await;

    let calls = t.factory.latest_for(&client).unwrap().calls();
    assert_eq!(
        calls.last(),
        Some(&TransportCall::SetRemoteAnswer("v=0 remote".into()))
    );
}
