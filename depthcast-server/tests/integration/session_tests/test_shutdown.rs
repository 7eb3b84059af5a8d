use depthcast_core::ClientId;
use std::time::Duration;

use crate::integration::{create_test_manager, create_test_stack, init_tracing};
use crate::utils::{TEST_OFFER, TestSocket, offer_json};

#[tokio::test]
async fn test_stop_closes_every_session_and_sensor() {
    init_tracing();
    let mut t = create_test_manager(Duration::from_secs(30)).await;
    let clients: Vec<ClientId> = (0..3).map(|_| ClientId::new()).collect();
    for client in &clients {
        t.manager.handle_offer(*client, TEST_OFFER.into()).await.unwrap();
    }
    // One broken teardown must not hold up the rest.
    t.factory.latest_for(&clients[0]).unwrap().fail_close();

    t.manager.stop().await;

    assert!(t.manager.active_sessions().is_empty());
    assert!(t.factory.created().iter().all(|h| h.was_closed()));
    assert_eq!(t.producer.subscriber_count(), 0);
    assert!(t.probe.is_closed());
}

#[tokio::test]
async fn test_shutdown_handle_waits_for_manager() {
    init_tracing();
    let stack = create_test_stack(Duration::from_secs(30)).await;
    let client = TestSocket::connect(&stack.router);
    client.send(&stack.router, &offer_json(TEST_OFFER)).await;
    let transport = stack
        .factory
        .wait_for_transport(&client.id, 1000)
        .await
        .expect("offer never reached the manager");

    stack.sessions.shutdown().await;

    assert!(transport.was_closed());
    assert!(stack.probe.is_closed());
    tokio::time::timeout(Duration::from_secs(1), stack.manager_task)
        .await
        .expect("manager did not finish")
        .unwrap();

    // A second shutdown after the manager is gone returns immediately.
    stack.sessions.shutdown().await;
}
