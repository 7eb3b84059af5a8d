use depthcast_core::{Colormap, CommandKind, ControlCommand, ControlResponse, ResponseOutcome};
use depthcast_server::ControlDispatcher;
use std::sync::Arc;
use std::time::Duration;

use crate::integration::{create_started_producer, init_tracing};

async fn dispatcher() -> (ControlDispatcher, Arc<depthcast_server::FrameProducer>) {
    let (producer, _probe) = create_started_producer().await;
    (ControlDispatcher::new(Arc::clone(&producer)), producer)
}

#[tokio::test]
async fn test_confidence_is_clamped_and_acked() {
    init_tracing();
    let (dispatcher, producer) = dispatcher().await;

    let low = dispatcher
        .handle_command(ControlCommand::SetConfidence { threshold: -5 })
        .await;
    assert!(low.is_ack());
    assert_eq!(low.message, "Confidence threshold set to 0");
    assert_eq!(producer.params().confidence_threshold(), 0);

    let high = dispatcher
        .handle_command(ControlCommand::SetConfidence { threshold: 999 })
        .await;
    assert!(high.is_ack());
    assert_eq!(high.command_type, CommandKind::SetConfidenceThreshold);
    assert_eq!(producer.params().confidence_threshold(), 255);
}

#[tokio::test]
async fn test_fps_limit_is_clamped_and_acked() {
    init_tracing();
    let (dispatcher, producer) = dispatcher().await;

    let low = dispatcher
        .handle_command(ControlCommand::SetFpsLimit { fps: 1 })
        .await;
    assert_eq!(low.message, "FPS limit set to 5");
    assert_eq!(producer.frame_interval(), Duration::from_millis(200));

    let high = dispatcher
        .handle_command(ControlCommand::SetFpsLimit { fps: 100 })
        .await;
    assert_eq!(high.message, "FPS limit set to 30");
    assert_eq!(producer.params().fps_limit(), 30);
}

#[tokio::test]
async fn test_colormap_names_are_case_insensitive() {
    init_tracing();
    let (dispatcher, producer) = dispatcher().await;

    let response = dispatcher
        .handle_command(ControlCommand::SetColormap { name: "hot".into() })
        .await;

    assert_eq!(
        response,
        ControlResponse::ack(CommandKind::SetColormap, "Colormap set to HOT")
    );
    assert_eq!(producer.params().colormap(), Colormap::Hot);
}

#[tokio::test]
async fn test_unknown_colormap_is_error_and_keeps_current() {
    init_tracing();
    let (dispatcher, producer) = dispatcher().await;

    let response = dispatcher
        .handle_command(ControlCommand::SetColormap {
            name: "sepia".into(),
        })
        .await;

    assert_eq!(response.outcome, ResponseOutcome::Error);
    assert_eq!(response.command_type, CommandKind::SetColormap);
    assert!(response.message.contains("sepia"));
    assert_eq!(producer.params().colormap(), Colormap::Rainbow);
}

#[tokio::test]
async fn test_range_follows_sensor_verdict() {
    init_tracing();
    let (dispatcher, producer) = dispatcher().await;

    let ok = dispatcher
        .handle_command(ControlCommand::SetRange { max_distance: 2000 })
        .await;
    assert_eq!(ok.message, "Range set to 2000");
    assert_eq!(producer.params().max_distance(), 2000);

    let rejected = dispatcher
        .handle_command(ControlCommand::SetRange { max_distance: 3000 })
        .await;
    assert!(!rejected.is_ack());
    assert_eq!(rejected.command_type, CommandKind::SetRange);
    assert!(rejected.message.contains("3000"));
    assert_eq!(producer.params().max_distance(), 2000, "unchanged on error");

    let negative = dispatcher
        .handle_command(ControlCommand::SetRange { max_distance: -1 })
        .await;
    assert!(!negative.is_ack());
}

#[tokio::test]
async fn test_raw_message_handling() {
    init_tracing();
    let (dispatcher, _producer) = dispatcher().await;

    assert!(dispatcher.handle_message(b"{broken").await.is_none());

    let unknown = dispatcher
        .handle_message(br#"{"type":"reboot","payload":{}}"#)
        .await
        .unwrap();
    assert_eq!(unknown.outcome, ResponseOutcome::Error);
    assert_eq!(unknown.command_type, CommandKind::Unknown);
    assert_eq!(unknown.message, "Unknown command type: reboot");

    let bad_payload = dispatcher
        .handle_message(br#"{"type":"set_fps_limit","payload":{"fps":"fast"}}"#)
        .await
        .unwrap();
    assert_eq!(bad_payload.outcome, ResponseOutcome::Error);
    assert_eq!(bad_payload.command_type, CommandKind::SetFpsLimit);
}

#[tokio::test]
async fn test_response_kind_matches_command_kind() {
    init_tracing();
    let (dispatcher, _producer) = dispatcher().await;
    let commands = [
        ControlCommand::SetRange { max_distance: 4000 },
        ControlCommand::SetRange { max_distance: 1234 },
        ControlCommand::SetConfidence { threshold: 12 },
        ControlCommand::SetColormap { name: "TURBO".into() },
        ControlCommand::SetColormap { name: "nope".into() },
        ControlCommand::SetFpsLimit { fps: 15 },
    ];

    for command in commands {
        let raw = command.encode();
        let response = dispatcher.handle_message(raw.as_bytes()).await.unwrap();
        let wire = serde_json::to_string(&response).unwrap();
        let decoded: ControlResponse = serde_json::from_str(&wire).unwrap();
        assert_eq!(decoded.command_type, command.kind(), "for {}", raw);
    }
}
