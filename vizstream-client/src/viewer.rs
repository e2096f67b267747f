//! Headless viewer: orbits the camera and mirrors received frames in
//! host memory, logging throughput once per second.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use vizstream_core::stream::{FrameOutcome, HostMirror, ViewerLoop};
use vizstream_core::{CameraState, Session, VizError};

use crate::config::{ClientConfig, OrbitConfig};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

// ── Orbit ────────────────────────────────────────────────────────

/// Camera looking at the origin from `angle` degrees around the Z axis.
pub fn orbit_camera(orbit: &OrbitConfig, angle: f32) -> CameraState {
    let theta = angle.to_radians();
    let eye = [
        orbit.distance * theta.cos(),
        orbit.distance * theta.sin(),
        orbit.elevation,
    ];
    let mut camera = CameraState::default().look_at(eye, [0.0; 3], [0.0, 0.0, 1.0]);
    camera.lens = orbit.lens;
    camera
}

// ── Viewer ───────────────────────────────────────────────────────

pub struct Viewer {
    config: ClientConfig,
    running: Arc<AtomicBool>,
}

impl Viewer {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Connect, then present frames until stopped, the frame budget is
    /// used up or the render node goes away. Returns frames presented.
    pub async fn run(&self) -> Result<u64, VizError> {
        self.running.store(true, Ordering::SeqCst);
        let session = Arc::new(Session::client_init(self.config.to_session_config()).await?);
        let (width, height) = session.resolution();
        info!("streaming {width}x{height} from {}", session.peer_addr());

        let result = self.present(Arc::clone(&session)).await;
        session.close().await?;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn present(&self, session: Arc<Session>) -> Result<u64, VizError> {
        if self.config.display.scene_frame != 0 {
            session.set_frame(self.config.display.scene_frame).await?;
        }

        let mut viewer = ViewerLoop::new(Arc::clone(&session), HostMirror::new());
        let interval = match self.config.display.target_fps {
            0 => Duration::ZERO,
            fps => Duration::from_secs_f64(1.0 / fps as f64),
        };
        let budget = self.config.display.frames;
        let mut angle = 0.0f32;
        let mut last_report = Instant::now();

        while self.running.load(Ordering::SeqCst)
            && (budget == 0 || viewer.frames_presented() < budget)
        {
            let loop_start = Instant::now();
            viewer.submit_camera(orbit_camera(&self.config.camera, angle))?;

            match viewer.run_frame().await {
                Ok(FrameOutcome::Presented { .. }) => {
                    angle = (angle + self.config.camera.degrees_per_frame) % 360.0;
                }
                Ok(FrameOutcome::Stale) => {}
                Err(VizError::PeerDisconnected) => {
                    warn!("render node went away");
                    break;
                }
                Err(e) => return Err(e),
            }

            if last_report.elapsed() >= REPORT_INTERVAL {
                let stats = session.statistics().snapshot();
                info!(
                    "{:.1} fps shown, {:.1} fps received, {} samples, {:.1} MB/s",
                    stats.local_fps,
                    stats.remote_fps,
                    stats.samples,
                    stats.recv_bps as f64 / (1024.0 * 1024.0)
                );
                last_report = Instant::now();
            }

            let elapsed = loop_start.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }

        Ok(viewer.frames_presented())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_keeps_distance_and_lens() {
        let orbit = OrbitConfig {
            distance: 4.0,
            elevation: 0.0,
            degrees_per_frame: 1.0,
            lens: 35.0,
        };
        let camera = orbit_camera(&orbit, 90.0);
        let [x, y, z] = camera.position();
        assert!(x.abs() < 1e-5);
        assert!((y - 4.0).abs() < 1e-5);
        assert_eq!(z, 0.0);
        assert_eq!(camera.lens, 35.0);
        camera.validate().unwrap();
    }

    #[tokio::test]
    async fn no_server_times_out() {
        let port = {
            let scratch = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            scratch.local_addr().unwrap().port()
        };
        let mut config = ClientConfig::default();
        config.network.port = port;
        config.network.timeout_ms = 200;

        let viewer = Viewer::new(config);
        assert!(matches!(viewer.run().await, Err(VizError::Timeout(_))));
    }
}
