//! Display-peer frame loop.
//!
//! Pushes camera changes to the render peer and shows whatever frame
//! arrives. A slow or missing frame never blocks camera updates: on a
//! timeout the previous frame is simply drawn again.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::VizError;
use crate::network::Session;
use crate::protocol::camera::CameraState;
use crate::stream::gpu::GpuBridge;
use crate::stream::types::PixelFormat;

/// Outcome of one [`ViewerLoop::run_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A new frame was uploaded and drawn.
    Presented { generation: u64 },
    /// Nothing new arrived; the previous frame (if any) was redrawn.
    Stale,
}

pub struct ViewerLoop<G> {
    session: Arc<Session>,
    gpu: G,
    gpu_shape: Option<(u32, u32, PixelFormat)>,
    camera_dirty: bool,
    presented: u64,
}

impl<G: GpuBridge> ViewerLoop<G> {
    pub fn new(session: Arc<Session>, gpu: G) -> Self {
        Self {
            session,
            gpu,
            gpu_shape: None,
            camera_dirty: false,
            presented: 0,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    /// Set the camera to send before the next frame. Only the latest
    /// submission between two frames is sent.
    pub fn submit_camera(&mut self, camera: CameraState) -> Result<(), VizError> {
        self.session.set_camera(camera)?;
        self.camera_dirty = true;
        Ok(())
    }

    /// Send the pending camera, wait for a frame and present it.
    ///
    /// Errors only when the session is lost or the GPU side fails.
    pub async fn run_frame(&mut self) -> Result<FrameOutcome, VizError> {
        if self.camera_dirty {
            self.session.send_cam_data()?;
            self.camera_dirty = false;
        }

        let frame = match self.session.recv_pixels_data().await {
            Ok(frame) => frame,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                if matches!(e, VizError::Timeout(_)) {
                    debug!("no frame within timeout");
                } else {
                    warn!("frame not received: {e}");
                }
                self.redraw()?;
                return Ok(FrameOutcome::Stale);
            }
        };

        let shape = (frame.width(), frame.height(), frame.format());
        if self.gpu_shape != Some(shape) {
            self.gpu.resize(shape.0, shape.1, shape.2)?;
            self.gpu_shape = Some(shape);
        }
        let generation = frame.generation();
        self.gpu.upload(frame)?;
        self.gpu.draw()?;
        self.session.statistics().tick_local();
        self.presented += 1;
        Ok(FrameOutcome::Presented { generation })
    }

    fn redraw(&mut self) -> Result<(), VizError> {
        if self.gpu.buffer_handle().is_some() {
            self.gpu.draw()?;
        }
        Ok(())
    }
}
