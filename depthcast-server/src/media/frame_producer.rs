use crate::media::depth_source::{DepthSource, DepthSourceError};
use crate::media::fps_counter::FpsCounter;
use crate::media::frame::{DEFAULT_RESOLUTION, RenderedFrame, SensorInfo};
use crate::media::frame_renderer::FrameRenderer;
use crate::media::runtime_params::RuntimeParams;
use dashmap::DashMap;
use depthcast_core::ClientId;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct SourceSlot {
    source: Box<dyn DepthSource>,
    last_request: Option<Instant>,
}

#[derive(Clone)]
struct CachedFrame {
    frame: Arc<RenderedFrame>,
    rendered_at: Instant,
}

#[derive(Default)]
struct FrameCache {
    latest: Option<CachedFrame>,
    fps: FpsCounter,
}

/// The single upstream feed shared by every peer session.
///
/// Frames are pulled on demand: each [`FrameProducer::tick`] either hands out
/// the cached image or, once the frame interval has elapsed, asks the sensor
/// for a new capture and renders it. The sensor is only ever driven by one
/// tick at a time.
pub struct FrameProducer {
    source: Mutex<SourceSlot>,
    renderer: Arc<dyn FrameRenderer>,
    params: Arc<RuntimeParams>,
    cache: RwLock<FrameCache>,
    sensor: RwLock<Option<SensorInfo>>,
    running: AtomicBool,
    frame_timeout: Duration,
    subscribers: DashMap<ClientId, u64>,
    next_token: AtomicU64,
}

impl FrameProducer {
    pub fn new(
        source: Box<dyn DepthSource>,
        renderer: Arc<dyn FrameRenderer>,
        params: Arc<RuntimeParams>,
        frame_timeout: Duration,
    ) -> Self {
        Self {
            source: Mutex::new(SourceSlot {
                source,
                last_request: None,
            }),
            renderer,
            params,
            cache: RwLock::new(FrameCache::default()),
            sensor: RwLock::new(None),
            running: AtomicBool::new(false),
            frame_timeout,
            subscribers: DashMap::new(),
            next_token: AtomicU64::new(0),
        }
    }

    pub fn params(&self) -> &Arc<RuntimeParams> {
        &self.params
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Opens and starts the sensor. A sensor that opens but fails to start is
    /// closed again before the error is returned.
    pub async fn start(&self) -> Result<SensorInfo, DepthSourceError> {
        let mut slot = self.source.lock().await;
        if self.is_running() {
            if let Some(info) = self.sensor.read().await.clone() {
                return Ok(info);
            }
        }

        slot.source.open().await?;
        if let Err(e) = slot.source.start().await {
            slot.source.close().await;
            return Err(e);
        }

        match slot.source.set_range(self.params.max_distance()).await {
            Ok(applied) => self.params.set_max_distance(applied),
            Err(e) => warn!("Sensor kept its default range: {}", e),
        }

        let (width, height) = DEFAULT_RESOLUTION;
        let info = slot.source.info().unwrap_or(SensorInfo {
            width,
            height,
            device_type: "unknown".to_string(),
        });
        *self.sensor.write().await = Some(info.clone());
        slot.last_request = None;
        self.running.store(true, Ordering::Release);

        info!(
            "Depth source started: {}x{} ({})",
            info.width, info.height, info.device_type
        );
        Ok(info)
    }

    /// Stops and closes the sensor, releasing the exclusive handle.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let mut slot = self.source.lock().await;
        slot.source.stop().await;
        slot.source.close().await;
        slot.last_request = None;
        self.cache.write().await.latest = None;
        info!("Depth source stopped");
    }

    /// Returns a frame for the caller's current media slot. Never fails: on
    /// any sensor or render problem the previous frame (or a blank one) is
    /// returned instead.
    pub async fn tick(&self) -> Arc<RenderedFrame> {
        if !self.is_running() {
            return Arc::new(self.blank_frame(None).await);
        }

        let interval = self.params.frame_interval();
        if let Some(frame) = self.fresh_frame(interval).await {
            return frame;
        }

        let mut slot = match self.source.try_lock() {
            Ok(slot) => slot,
            Err(_) => {
                // Another session is already talking to the sensor.
                if let Some(cached) = self.cached_frame().await {
                    return cached;
                }
                self.source.lock().await
            }
        };

        if let Some(frame) = self.fresh_frame(interval).await {
            return frame;
        }
        if !self.is_running() {
            return Arc::new(self.blank_frame(slot.source.info()).await);
        }

        // Sensor requests stay one interval apart even while they keep
        // failing, however many sessions are ticking.
        if let Some(last) = slot.last_request {
            let due = last + interval;
            if Instant::now() < due {
                if let Some(cached) = self.cached_frame().await {
                    return cached;
                }
                tokio::time::sleep_until(due).await;
            }
        }

        slot.last_request = Some(Instant::now());
        let render_params = self.params.snapshot();

        match slot.source.request_frame(self.frame_timeout).await {
            Ok(Some(raw)) => {
                let sequence = raw.sequence;
                let rendered = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    self.renderer.render(&raw, &render_params)
                }));
                slot.source.release_frame(raw).await;

                match rendered {
                    Ok(image) => return self.store(image).await,
                    Err(_) => warn!("Renderer panicked on depth frame {}", sequence),
                }
            }
            Ok(None) => debug!("No depth frame within {:?}", self.frame_timeout),
            Err(e) => warn!("Depth frame request failed: {}", e),
        }

        if let Some(cached) = self.cached_frame().await {
            return cached;
        }
        Arc::new(self.blank_frame(slot.source.info()).await)
    }

    /// Clamps to the supported range; the next tick uses the new interval.
    pub fn set_fps_limit(&self, fps: i64) -> u32 {
        self.params.set_fps_limit(fps)
    }

    pub fn frame_interval(&self) -> Duration {
        self.params.frame_interval()
    }

    pub async fn set_range(&self, max_distance: u32) -> Result<u32, DepthSourceError> {
        let mut slot = self.source.lock().await;
        slot.source.set_range(max_distance).await
    }

    pub async fn sensor_info(&self) -> Option<SensorInfo> {
        self.sensor.read().await.clone()
    }

    /// Rate of successful renders over the recent window.
    pub async fn measured_fps(&self) -> f64 {
        self.cache.read().await.fps.fps()
    }

    /// Registers `id` as a consumer. Subscribing again replaces the previous
    /// subscription for the same id, which then yields no more frames.
    pub fn subscribe(self: &Arc<Self>, id: ClientId) -> FrameSubscription {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, token);
        debug!("Client {} subscribed to frames", id);
        FrameSubscription {
            producer: Arc::clone(self),
            id,
            token,
            next_due: Instant::now(),
        }
    }

    pub fn unsubscribe(&self, id: &ClientId) -> bool {
        let removed = self.subscribers.remove(id).is_some();
        if removed {
            debug!("Client {} unsubscribed from frames", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_subscribed(&self, id: &ClientId) -> bool {
        self.subscribers.contains_key(id)
    }

    fn holds_token(&self, id: &ClientId, token: u64) -> bool {
        self.subscribers
            .get(id)
            .is_some_and(|current| *current == token)
    }

    async fn store(&self, image: RenderedFrame) -> Arc<RenderedFrame> {
        let frame = Arc::new(image);
        let now = Instant::now();
        let mut cache = self.cache.write().await;
        cache.latest = Some(CachedFrame {
            frame: Arc::clone(&frame),
            rendered_at: now,
        });
        cache.fps.tick(now);
        debug!("Rendered frame, {:.1} fps", cache.fps.fps());
        frame
    }

    async fn fresh_frame(&self, interval: Duration) -> Option<Arc<RenderedFrame>> {
        let cache = self.cache.read().await;
        let cached = cache.latest.as_ref()?;
        (cached.rendered_at.elapsed() < interval).then(|| Arc::clone(&cached.frame))
    }

    async fn cached_frame(&self) -> Option<Arc<RenderedFrame>> {
        self.cache
            .read()
            .await
            .latest
            .as_ref()
            .map(|cached| Arc::clone(&cached.frame))
    }

    async fn blank_frame(&self, live: Option<SensorInfo>) -> RenderedFrame {
        let known = match live {
            Some(info) => Some(info),
            None => self.sensor.read().await.clone(),
        };
        let (width, height) = known
            .map(|info| (info.width, info.height))
            .unwrap_or(DEFAULT_RESOLUTION);
        RenderedFrame::blank(width, height)
    }
}

/// A session's paced view of the shared feed.
pub struct FrameSubscription {
    producer: Arc<FrameProducer>,
    id: ClientId,
    token: u64,
    next_due: Instant,
}

impl FrameSubscription {
    pub fn client_id(&self) -> ClientId {
        self.id
    }

    /// Waits for the next frame slot and returns that slot's frame. Returns
    /// `None` once the subscription has been cancelled or replaced.
    pub async fn next_frame(&mut self) -> Option<Arc<RenderedFrame>> {
        if !self.producer.holds_token(&self.id, self.token) {
            return None;
        }
        tokio::time::sleep_until(self.next_due).await;
        if !self.producer.holds_token(&self.id, self.token) {
            return None;
        }

        let frame = self.producer.tick().await;
        let now = Instant::now();
        self.next_due = (self.next_due + self.producer.frame_interval()).max(now);
        Some(frame)
    }

    pub fn frame_interval(&self) -> Duration {
        self.producer.frame_interval()
    }
}
