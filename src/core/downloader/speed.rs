use std::collections::VecDeque;
use std::time::Duration;

/// Interval between two speed/ETA emissions while a batch is active.
pub const SPEED_TICK: Duration = Duration::from_millis(500);
/// Number of instantaneous samples averaged into the reported speed.
pub const SPEED_WINDOW: usize = 5;

/// Result of one estimator tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSample {
    /// Mean of the sliding window, bytes per second. Always finite.
    pub speed: f64,
    /// Seconds remaining, `None` while the speed is zero.
    pub remaining: Option<f64>,
}

/// Sliding-window throughput estimator.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    window: VecDeque<f64>,
    capacity: usize,
    previous: u64,
}

impl SpeedEstimator {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            previous: 0,
        }
    }

    /// Record the cumulative byte count observed `elapsed` after the previous tick.
    ///
    /// A zero-length interval carries no information and is not sampled.
    pub fn tick(&mut self, downloaded: u64, elapsed: Duration, total: u64) -> SpeedSample {
        let delta = downloaded.saturating_sub(self.previous);
        self.previous = downloaded;

        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            if self.window.len() == self.capacity {
                self.window.pop_front();
            }
            self.window.push_back(delta as f64 / secs);
        }

        let speed = self.speed();
        let remaining = if speed > 0.0 {
            Some(total.saturating_sub(downloaded) as f64 / speed)
        } else {
            None
        };

        SpeedSample { speed, remaining }
    }

    pub fn speed(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new(SPEED_WINDOW)
    }
}
