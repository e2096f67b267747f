//! Frame-rate, sample and traffic statistics.
//!
//! Producers (render loop, transport tasks) call the `record_*` / `tick_*`
//! methods; readers use the getters, which never block: they compute a
//! fresh sliding-window value when the counter is free and fall back to the
//! last published value otherwise.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::stream::throughput::ThroughputMeter;

// ── FpsCounter ───────────────────────────────────────────────────

/// Sliding-window frame counter.
#[derive(Debug)]
pub struct FpsCounter {
    stamps: VecDeque<Instant>,
    window: Duration,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            stamps: VecDeque::with_capacity(128),
            window,
        }
    }

    pub fn tick_at(&mut self, now: Instant) {
        self.stamps.push_back(now);
        self.evict(now);
    }

    /// Frames per second over the window ending at `now`.
    pub fn fps_at(&mut self, now: Instant) -> f32 {
        self.evict(now);
        self.stamps.len() as f32 / self.window.as_secs_f32()
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&ts) = self.stamps.front() {
            if now.saturating_duration_since(ts) > self.window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

// ── StatsSnapshot ────────────────────────────────────────────────

/// Point-in-time copy of every statistic.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatsSnapshot {
    pub samples: u32,
    pub remote_fps: f32,
    pub local_fps: f32,
    pub frames_sent: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_bps: u64,
    pub recv_bps: u64,
}

// ── Statistics ───────────────────────────────────────────────────

#[derive(Default)]
pub struct Statistics {
    samples: AtomicU32,
    /// `f32` bit patterns.
    remote_fps: AtomicU32,
    local_fps: AtomicU32,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    remote_counter: Mutex<FpsCounter>,
    local_counter: Mutex<FpsCounter>,
    send_meter: Mutex<ThroughputMeter>,
    recv_meter: Mutex<ThroughputMeter>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Recording ────────────────────────────────────────────────

    /// A frame arrived over the network and was accepted.
    pub fn tick_remote(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        let mut counter = self
            .remote_counter
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        counter.tick_at(now);
        store_f32(&self.remote_fps, counter.fps_at(now));
    }

    /// A frame was produced (server) or presented (client) locally.
    pub fn tick_local(&self) {
        let mut counter = self
            .local_counter
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        counter.tick_at(now);
        store_f32(&self.local_fps, counter.fps_at(now));
    }

    pub fn set_samples(&self, samples: u32) {
        self.samples.store(samples, Ordering::Relaxed);
    }

    pub fn record_frame_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.record_sent(bytes);
    }

    pub fn record_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.send_meter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(bytes as u64);
    }

    pub fn record_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.recv_meter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(bytes as u64);
    }

    /// A frame was superseded or refused before it was used.
    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    // ── Reading ──────────────────────────────────────────────────

    pub fn samples(&self) -> u32 {
        self.samples.load(Ordering::Relaxed)
    }

    pub fn remote_fps(&self) -> f32 {
        Self::read_fps(&self.remote_counter, &self.remote_fps)
    }

    pub fn local_fps(&self) -> f32 {
        Self::read_fps(&self.local_counter, &self.local_fps)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples: self.samples(),
            remote_fps: self.remote_fps(),
            local_fps: self.local_fps(),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped(),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            send_bps: read_meter(&self.send_meter),
            recv_bps: read_meter(&self.recv_meter),
        }
    }

    /// Zero every counter and window.
    pub fn clear(&self) {
        self.samples.store(0, Ordering::Relaxed);
        store_f32(&self.remote_fps, 0.0);
        store_f32(&self.local_fps, 0.0);
        for counter in [
            &self.frames_sent,
            &self.frames_received,
            &self.frames_dropped,
            &self.bytes_sent,
            &self.bytes_received,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        for fps in [&self.remote_counter, &self.local_counter] {
            fps.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
        for meter in [&self.send_meter, &self.recv_meter] {
            meter.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    fn read_fps(counter: &Mutex<FpsCounter>, cached: &AtomicU32) -> f32 {
        match counter.try_lock() {
            Ok(mut c) => {
                let fps = c.fps_at(Instant::now());
                store_f32(cached, fps);
                fps
            }
            Err(_) => f32::from_bits(cached.load(Ordering::Relaxed)),
        }
    }
}

fn store_f32(slot: &AtomicU32, value: f32) {
    slot.store(value.to_bits(), Ordering::Relaxed);
}

fn read_meter(meter: &Mutex<ThroughputMeter>) -> u64 {
    meter
        .try_lock()
        .map(|mut m| m.bytes_per_sec())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_window() {
        let mut c = FpsCounter::with_window(Duration::from_secs(1));
        let t0 = Instant::now();
        for i in 0..30 {
            c.tick_at(t0 + Duration::from_millis(i * 33));
        }
        assert_eq!(c.fps_at(t0 + Duration::from_millis(990)), 30.0);
        // nothing new for two seconds: decays to zero
        assert_eq!(c.fps_at(t0 + Duration::from_secs(3)), 0.0);
    }

    #[test]
    fn counters_and_clear() {
        let stats = Statistics::new();
        stats.set_samples(64);
        stats.tick_remote();
        stats.tick_remote();
        stats.tick_local();
        stats.record_frame_sent(1024);
        stats.record_received(2048);
        stats.record_dropped();

        let snap = stats.snapshot();
        assert_eq!(snap.samples, 64);
        assert_eq!(snap.frames_received, 2);
        assert_eq!(snap.frames_sent, 1);
        assert_eq!(snap.bytes_sent, 1024);
        assert_eq!(snap.bytes_received, 2048);
        assert_eq!(snap.frames_dropped, 1);
        assert!(stats.remote_fps() > 0.0);
        assert!(stats.local_fps() > 0.0);

        stats.clear();
        let snap = stats.snapshot();
        assert_eq!(snap, StatsSnapshot::default());
    }
}
