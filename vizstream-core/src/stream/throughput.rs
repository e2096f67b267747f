//! Rolling-window throughput meter.
//!
//! Tracks bytes moved over a rolling window and derives bytes/second.
//! One meter per direction lives in [`Statistics`](crate::stream::stats::Statistics).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub struct ThroughputMeter {
    /// Samples: `(when, bytes)`.
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    /// Running total of bytes in the window.
    total_bytes: u64,
}

impl ThroughputMeter {
    /// A meter with a 1-second window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(256),
            window,
            total_bytes: 0,
        }
    }

    pub fn record(&mut self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    /// Record with an explicit timestamp (useful for testing).
    pub fn record_at(&mut self, when: Instant, bytes: u64) {
        self.samples.push_back((when, bytes));
        self.total_bytes += bytes;
        self.evict(when);
    }

    /// Bytes/second over the window ending at `now`.
    ///
    /// Divides by the full window, so the rate decays to zero once
    /// traffic stops.
    pub fn bytes_per_sec_at(&mut self, now: Instant) -> u64 {
        self.evict(now);
        (self.total_bytes as f64 / self.window.as_secs_f64()) as u64
    }

    pub fn bytes_per_sec(&mut self) -> u64 {
        self.bytes_per_sec_at(Instant::now())
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.total_bytes = 0;
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(ts, bytes)) = self.samples.front() {
            if now.saturating_duration_since(ts) > self.window {
                self.samples.pop_front();
                self.total_bytes = self.total_bytes.saturating_sub(bytes);
            } else {
                break;
            }
        }
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}
