use std::collections::VecDeque;
use tokio::time::Instant;

/// Frame rate over a sliding window of the most recent timestamps.
#[derive(Debug)]
pub struct FpsCounter {
    window: usize,
    stamps: VecDeque<Instant>,
}

impl FpsCounter {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(2),
            stamps: VecDeque::with_capacity(window.max(2)),
        }
    }

    pub fn tick(&mut self, at: Instant) {
        if self.stamps.len() == self.window {
            self.stamps.pop_front();
        }
        self.stamps.push_back(at);
    }

    pub fn fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.stamps.front(), self.stamps.back()) else {
            return 0.0;
        };
        let span = last.duration_since(*first).as_secs_f64();
        if self.stamps.len() < 2 || span <= 0.0 {
            return 0.0;
        }
        (self.stamps.len() - 1) as f64 / span
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(30)
    }
}
