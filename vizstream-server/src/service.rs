//! Render node service.
//!
//! Serves one display client at a time: accept, negotiate, run the render
//! loop until the client leaves, then wait for the next one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info, warn};

use vizstream_core::stream::{RenderService, TestPatternBackend};
use vizstream_core::{Session, SessionListener, VizError};

use crate::config::ServerConfig;

// ── RenderNode ───────────────────────────────────────────────────

pub struct RenderNode {
    config: ServerConfig,
    running: Arc<AtomicBool>,
}

impl RenderNode {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that stops the node from another task (e.g. Ctrl-C).
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Serve clients until stopped.
    ///
    /// Fails only if the listen address cannot be bound.
    pub async fn run(&self) -> Result<(), VizError> {
        self.running.store(true, Ordering::SeqCst);

        while self.running.load(Ordering::SeqCst) {
            let listener = SessionListener::bind(self.config.to_session_config()).await?;
            let session = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = wait_for_stop(&self.running) => break,
            };

            let session = match session {
                Ok(session) => Arc::new(session),
                Err(VizError::Timeout(_)) => continue,
                Err(e) => {
                    warn!("client rejected: {e}");
                    continue;
                }
            };

            let peer = session.peer_addr();
            if let Err(e) = self.serve(Arc::clone(&session)).await {
                error!("session with {peer} failed: {e}");
            }
            if let Err(e) = session.close().await {
                warn!("close: {e}");
            }
            let stats = session.statistics().snapshot();
            info!(
                "session with {peer} ended: {} frames sent, {} dropped, {} bytes",
                stats.frames_sent, stats.frames_dropped, stats.bytes_sent
            );
        }

        self.running.store(false, Ordering::SeqCst);
        info!("render node stopped");
        Ok(())
    }

    /// Run the render loop for one session, mirroring the node's stop flag.
    async fn serve(&self, session: Arc<Session>) -> Result<(), VizError> {
        let backend = TestPatternBackend::new(self.config.render.max_samples);
        let mut service = RenderService::new(session, backend, self.config.to_service_config())?;
        let service_running = service.stop_handle();

        let node_running = Arc::clone(&self.running);
        let watcher = tokio::spawn(async move {
            wait_for_stop(&node_running).await;
            service_running.store(false, Ordering::SeqCst);
        });

        let result = match service.run().await {
            // the client hanging up is the normal way a session ends
            Err(VizError::PeerDisconnected) => Ok(()),
            other => other,
        };
        watcher.abort();
        result
    }
}

/// Resolves when `running` becomes false.
async fn wait_for_stop(running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use vizstream_core::SessionConfig;
    use vizstream_core::stream::{FrameOutcome, HostMirror, ViewerLoop};

    #[test]
    fn stop_handle_works() {
        let node = RenderNode::new(ServerConfig::default());
        assert!(!node.is_running());
        let handle = node.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert!(node.is_running());
        node.stop();
        assert!(!node.is_running());
    }

    #[tokio::test]
    async fn serves_a_client_then_stops() {
        // find a free port for the node to bind
        let port = {
            let scratch = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            scratch.local_addr().unwrap().port()
        };
        let mut config = ServerConfig::default();
        config.network.address = "127.0.0.1".into();
        config.network.port = port;
        config.render.target_fps = 0;

        let node = Arc::new(RenderNode::new(config));
        let stop = node.stop_handle();
        let task = tokio::spawn({
            let node = Arc::clone(&node);
            async move { node.run().await }
        });

        let client = Session::client_init(
            SessionConfig::new("127.0.0.1", port)
                .with_timeout(Duration::from_secs(5))
                .with_resolution(48, 32),
        )
        .await
        .unwrap();
        let mut viewer = ViewerLoop::new(Arc::new(client), HostMirror::new());
        let outcome = viewer.run_frame().await.unwrap();
        assert!(matches!(outcome, FrameOutcome::Presented { .. }));
        assert_eq!(viewer.gpu().frame().unwrap().dimensions(), (48, 32));

        viewer.session().close().await.unwrap();
        stop.store(false, Ordering::SeqCst);
        task.await.unwrap().unwrap();
    }
}
