//! Single-slot "latest camera" cell.
//!
//! Writers overwrite; the consumer only ever sees the most recent value.
//! Stale states are never queued.

use std::time::Duration;

use tokio::sync::{Mutex, watch};

use crate::protocol::camera::CameraState;

#[derive(Debug)]
pub struct CameraCell {
    tx: watch::Sender<CameraState>,
    rx: Mutex<watch::Receiver<CameraState>>,
}

impl CameraCell {
    pub fn new(initial: CameraState) -> Self {
        let (tx, rx) = watch::channel(initial);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Store `camera`, replacing anything not yet consumed.
    pub fn publish(&self, camera: CameraState) {
        self.tx.send_replace(camera);
    }

    /// Non-blocking: the pending update, if one arrived since the last take.
    pub fn try_take(&self) -> Option<CameraState> {
        let mut rx = self.rx.try_lock().ok()?;
        match rx.has_changed() {
            Ok(true) => Some(*rx.borrow_and_update()),
            _ => None,
        }
    }

    /// Wait up to `timeout` for an update.
    pub async fn take_timeout(&self, timeout: Duration) -> Option<CameraState> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(timeout, rx.changed()).await {
            Ok(Ok(())) => Some(*rx.borrow_and_update()),
            _ => None,
        }
    }
}
