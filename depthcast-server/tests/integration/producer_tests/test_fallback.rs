use depthcast_server::{
    DEFAULT_RESOLUTION, DepthFrame, FrameProducer, FrameRenderer, RenderParams, RenderedFrame,
    RuntimeParams,
};
use std::sync::Arc;
use std::time::Duration;

use crate::integration::{FRAME_TIMEOUT, create_started_producer, create_test_producer, init_tracing};
use crate::utils::MockDepthSource;

struct PanickingRenderer;

impl FrameRenderer for PanickingRenderer {
    fn render(&self, _frame: &DepthFrame, _params: &RenderParams) -> RenderedFrame {
        panic!("renderer bug");
    }
}

#[tokio::test(start_paused = true)]
async fn test_failure_without_cache_yields_blank_at_sensor_size() {
    init_tracing();
    let (producer, probe) = create_started_producer().await;
    probe.fail_requests(true);

    let frame = producer.tick().await;

    assert_eq!((frame.width, frame.height), (4, 3));
    assert!(frame.is_blank());
}

#[tokio::test(start_paused = true)]
async fn test_failure_after_success_reuses_last_frame() {
    init_tracing();
    let (producer, probe) = create_started_producer().await;

    let good = producer.tick().await;
    probe.fail_requests(true);
    tokio::time::advance(producer.frame_interval()).await;
    let fallback = producer.tick().await;

    assert!(Arc::ptr_eq(&good, &fallback));
    assert_eq!(probe.requests(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_sensor_is_bounded_by_timeout() {
    init_tracing();
    let (producer, probe) = create_started_producer().await;
    probe.set_delay(Duration::from_secs(60));

    let start = tokio::time::Instant::now();
    let frame = producer.tick().await;

    assert!(start.elapsed() <= FRAME_TIMEOUT + Duration::from_millis(1));
    assert!(frame.is_blank());
}

#[tokio::test(start_paused = true)]
async fn test_renderer_panic_degrades_to_blank() {
    init_tracing();
    let (source, probe) = MockDepthSource::new(4, 3);
    let producer = FrameProducer::new(
        Box::new(source),
        Arc::new(PanickingRenderer),
        Arc::new(RuntimeParams::default()),
        FRAME_TIMEOUT,
    );
    producer.start().await.unwrap();

    let frame = producer.tick().await;

    assert!(frame.is_blank());
    assert_eq!(probe.releases(), 1, "raw frame still goes back to the sensor");
}

#[tokio::test]
async fn test_idle_producer_does_not_touch_sensor() {
    init_tracing();
    let (producer, probe) = create_test_producer();

    let frame = producer.tick().await;

    assert_eq!((frame.width, frame.height), DEFAULT_RESOLUTION);
    assert!(frame.is_blank());
    assert_eq!(probe.requests(), 0);
}

#[tokio::test]
async fn test_start_failure_closes_sensor() {
    init_tracing();
    let (producer, probe) = create_test_producer();
    probe.fail_start(true);

    assert!(producer.start().await.is_err());
    assert!(probe.is_closed());
    assert!(!producer.is_running());
}

#[tokio::test]
async fn test_stop_releases_sensor() {
    init_tracing();
    let (producer, probe) = create_started_producer().await;
    producer.tick().await;

    producer.stop().await;
    producer.stop().await;

    assert!(probe.is_closed());
    assert!(!probe.is_started());
    let after = producer.tick().await;
    assert!(after.is_blank());
    assert_eq!(probe.requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failing_sensor_is_polled_at_fps_limit_across_sessions() {
    init_tracing();
    let (producer, probe) = create_started_producer().await;
    producer.set_fps_limit(10);
    producer.tick().await;
    probe.fail_requests(true);

    let start = tokio::time::Instant::now();
    let sessions = (0..3).map(|_| {
        let mut frames = producer.subscribe(depthcast_core::ClientId::new());
        tokio::spawn(async move {
            while start.elapsed() < Duration::from_secs(1) {
                frames.next_frame().await.expect("subscription ended");
            }
        })
    });
    futures::future::join_all(sessions).await;

    let retries = probe.requests() - 1;
    assert!(retries <= 11, "sensor hit {} times in 1s at 10 fps", retries);
    assert!(retries >= 9, "sensor polled only {} times", retries);
}
