//! Render-peer frame loop.
//!
//! Drives a [`RenderBackend`] from the state a [`Session`] receives:
//!
//! 1. Adopt the newest camera, range, scene frame and render data.
//! 2. Restart accumulation if any of them changed or a reset was requested.
//! 3. Render into a private buffer, publish it to the frame store.
//! 4. Queue it for sending together with a STATE report.
//! 5. Pace to the target frame rate.
//!
//! Sending is asynchronous: the loop never waits on the network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::VizError;
use crate::network::Session;
use crate::protocol::range::RangeQuery;
use crate::protocol::state::RenderState;
use crate::stream::backend::{RenderBackend, RenderRequest};
use crate::stream::store::WriteMode;
use crate::stream::types::PixelBuffer;

// ── RenderServiceConfig ──────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RenderServiceConfig {
    /// Frames rendered per second. `0` renders as fast as possible.
    pub target_fps: u32,
    pub write_mode: WriteMode,
}

impl Default for RenderServiceConfig {
    fn default() -> Self {
        Self {
            target_fps: 30,
            write_mode: WriteMode::Swap,
        }
    }
}

// ── RenderService ────────────────────────────────────────────────

pub struct RenderService<B> {
    session: Arc<Session>,
    backend: B,
    target: PixelBuffer,
    config: RenderServiceConfig,
    running: Arc<AtomicBool>,
    /// Inputs of the previous frame, to detect when accumulation restarts.
    last_range: Option<RangeQuery>,
    last_scene_frame: i32,
    frames: u64,
}

impl<B: RenderBackend> RenderService<B> {
    pub fn new(
        session: Arc<Session>,
        backend: B,
        config: RenderServiceConfig,
    ) -> Result<Self, VizError> {
        let (width, height) = session.resolution();
        let target = PixelBuffer::new(width, height, session.pixel_format())?;
        let last_scene_frame = session.scene_frame();
        Ok(Self {
            session,
            backend,
            target,
            config,
            running: Arc::new(AtomicBool::new(false)),
            last_range: None,
            last_scene_frame,
            frames: 0,
        })
    }

    /// Cloneable handle; storing `false` stops [`run`](Self::run) after
    /// the current frame.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Render until stopped. Returns early only if the session is lost;
    /// other errors skip the frame.
    pub async fn run(&mut self) -> Result<(), VizError> {
        self.running.store(true, Ordering::SeqCst);
        let interval = frame_interval(self.config.target_fps);
        info!(fps = self.config.target_fps, "render loop started");

        while self.running.load(Ordering::SeqCst) {
            let loop_start = Instant::now();
            match self.render_once().await {
                Ok(_) => {}
                Err(e) if e.is_fatal() => {
                    self.running.store(false, Ordering::SeqCst);
                    return Err(e);
                }
                Err(e) => warn!("frame skipped: {e}"),
            }
            pace(loop_start, interval).await;
        }

        info!(frames = self.frames, "render loop stopped");
        Ok(())
    }

    /// One iteration of the loop. Returns the generation queued for sending.
    pub async fn render_once(&mut self) -> Result<u64, VizError> {
        if self.sync_inputs()? {
            self.backend.reset();
        }

        let camera = self.session.get_camera();
        let range = self.last_range;
        let request = RenderRequest {
            camera: &camera,
            range: range.as_ref(),
            scene_frame: self.last_scene_frame,
        };
        let output = self.backend.render(request, &mut self.target).await?;

        let generation = self.session.set_pixels(&self.target, self.config.write_mode)?;
        let stats = self.session.statistics();
        stats.set_samples(output.samples);
        self.session.set_render_state(RenderState {
            bounds: output.bounds.unwrap_or_default(),
            samples: output.samples,
            fps: stats.local_fps(),
        });
        self.session.send_pixels_data()?;
        stats.tick_local();
        self.frames += 1;
        Ok(generation)
    }

    /// Pull peer-driven state into the loop. True if accumulated samples
    /// are no longer valid.
    fn sync_inputs(&mut self) -> Result<bool, VizError> {
        let mut restart = self.session.poll_cam_data()?;
        restart |= self.session.take_reset_request();

        if let Some(blob) = self.session.recv_render_data() {
            self.backend.apply_render_data(&blob);
            restart = true;
        }

        let (width, height) = self.session.resolution();
        if self.target.dimensions() != (width, height) {
            debug!("render target now {width}x{height}");
            self.target
                .reallocate(width, height, self.session.pixel_format())?;
            restart = true;
        }

        let scene_frame = self.session.scene_frame();
        if scene_frame != self.last_scene_frame {
            self.last_scene_frame = scene_frame;
            restart = true;
        }

        // Ranges derived from data bounds select everything; only an
        // explicit query filters.
        let range = self.session.configured_range();
        if range != self.last_range {
            self.last_range = range;
            restart = true;
        }
        Ok(restart)
    }
}

// ── Pacing ───────────────────────────────────────────────────────

pub(crate) fn frame_interval(fps: u32) -> Duration {
    if fps == 0 {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(1.0 / fps as f64)
    }
}

/// Sleep for the remainder of the frame interval.
pub(crate) async fn pace(loop_start: Instant, interval: Duration) {
    let elapsed = loop_start.elapsed();
    if elapsed < interval {
        tokio::time::sleep(interval - elapsed).await;
    } else {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_fps_is_unpaced() {
        assert_eq!(frame_interval(0), Duration::ZERO);
        assert_eq!(frame_interval(50), Duration::from_millis(20));
    }

    #[tokio::test]
    async fn pace_sleeps_remaining_interval() {
        let start = Instant::now();
        pace(start, Duration::from_millis(30)).await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
