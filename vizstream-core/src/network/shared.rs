//! State shared between a [`Session`](super::Session) handle and its
//! reader/writer tasks.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::{ErrorKind, VizError};
use crate::flags::FrameFlags;
use crate::packet::Message;
use crate::protocol::camera::CameraState;
use crate::protocol::range::RangeQuery;
use crate::protocol::state::RenderState;
use crate::stream::camera::CameraCell;
use crate::stream::stats::Statistics;
use crate::stream::store::FrameBufferStore;
use crate::stream::types::{PixelBuffer, PixelFormat};

/// Which end of the link this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Render peer: accepts the connection, produces pixels.
    Server,
    /// Display peer: dials the server, produces camera updates.
    Client,
}

/// Frame waiting in the single outbound slot.
#[derive(Debug, Clone)]
pub(crate) struct OutboundFrame {
    pub buffer: Arc<PixelBuffer>,
    pub state: RenderState,
}

/// Camera waiting in the single outbound slot.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OutboundCamera {
    pub camera: CameraState,
    pub flags: FrameFlags,
}

pub(crate) struct Shared {
    pub role: Role,
    pub format: PixelFormat,
    /// zstd level when compression was negotiated.
    pub compression: Option<i32>,

    pub store: FrameBufferStore,
    pub stats: Statistics,
    pub inbound_camera: CameraCell,

    resolution: Mutex<(u32, u32)>,
    pub pending_resize: AtomicBool,
    pub range: Mutex<Option<RangeQuery>>,
    /// Last STATE report received from the peer.
    pub remote_state: Mutex<RenderState>,
    pub scene_frame: AtomicI32,
    pub reset_requested: AtomicBool,
    pub render_data: Mutex<Option<Bytes>>,
    pub timestep_ms: AtomicU64,
    pub last_sent_generation: AtomicU64,

    last_error: AtomicI32,
    alive: AtomicBool,
    pub cancel: CancellationToken,

    pub control_tx: mpsc::Sender<Message>,
    pub pixel_tx: watch::Sender<Option<OutboundFrame>>,
    pub camera_tx: watch::Sender<Option<OutboundCamera>>,
    pub inbound_tx: watch::Sender<Option<Arc<PixelBuffer>>>,
}

/// Receiving ends handed to the transport tasks and the session handle.
pub(crate) struct Endpoints {
    pub control_rx: mpsc::Receiver<Message>,
    pub pixel_rx: watch::Receiver<Option<OutboundFrame>>,
    pub camera_rx: watch::Receiver<Option<OutboundCamera>>,
    pub inbound_rx: watch::Receiver<Option<Arc<PixelBuffer>>>,
}

/// Control messages queued ahead of the writer.
const CONTROL_QUEUE: usize = 64;

impl Shared {
    pub fn new(
        role: Role,
        width: u32,
        height: u32,
        format: PixelFormat,
        compression: Option<i32>,
        timestep: Duration,
    ) -> Result<(Self, Endpoints), VizError> {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE);
        let (pixel_tx, pixel_rx) = watch::channel(None);
        let (camera_tx, camera_rx) = watch::channel(None);
        let (inbound_tx, inbound_rx) = watch::channel(None);

        let shared = Self {
            role,
            format,
            compression,
            store: FrameBufferStore::new(width, height, format)?,
            stats: Statistics::new(),
            inbound_camera: CameraCell::new(CameraState::default()),
            resolution: Mutex::new((width, height)),
            pending_resize: AtomicBool::new(false),
            range: Mutex::new(None),
            remote_state: Mutex::new(RenderState::default()),
            scene_frame: AtomicI32::new(0),
            reset_requested: AtomicBool::new(false),
            render_data: Mutex::new(None),
            timestep_ms: AtomicU64::new(timestep.as_millis() as u64),
            last_sent_generation: AtomicU64::new(0),
            last_error: AtomicI32::new(0),
            alive: AtomicBool::new(true),
            cancel: CancellationToken::new(),
            control_tx,
            pixel_tx,
            camera_tx,
            inbound_tx,
        };
        let endpoints = Endpoints {
            control_rx,
            pixel_rx,
            camera_rx,
            inbound_rx,
        };
        Ok((shared, endpoints))
    }

    // ── Resolution ───────────────────────────────────────────────

    pub fn resolution(&self) -> (u32, u32) {
        *self.resolution.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reallocate the store and drop every frame of the old size.
    pub fn apply_resolution(&self, width: u32, height: u32) -> Result<(), VizError> {
        self.store.resize(width, height, self.format)?;
        *self.resolution.lock().unwrap_or_else(PoisonError::into_inner) = (width, height);
        if let Some(stale) = self.pixel_tx.send_replace(None) {
            self.note_superseded(&stale);
        }
        self.inbound_tx.send_replace(None);
        Ok(())
    }

    /// Count `frame` as dropped if the writer never got to it.
    pub fn note_superseded(&self, frame: &OutboundFrame) {
        if frame.buffer.generation() > self.last_sent_generation.load(Ordering::SeqCst) {
            self.stats.record_dropped();
        }
    }

    pub fn timestep(&self) -> Duration {
        Duration::from_millis(self.timestep_ms.load(Ordering::Relaxed))
    }

    // ── Errors & liveness ────────────────────────────────────────

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Record a recoverable error as the sticky last error.
    pub fn record_error(&self, err: &VizError) {
        self.last_error.store(err.code(), Ordering::SeqCst);
    }

    pub fn clear_error(&self) {
        self.last_error.store(0, Ordering::SeqCst);
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.last_error.load(Ordering::SeqCst))
    }

    /// The session cannot continue: record, mark dead, stop both tasks.
    pub fn fail(&self, err: &VizError) {
        if self.alive.swap(false, Ordering::SeqCst) {
            match err {
                VizError::PeerDisconnected => warn!("peer disconnected"),
                other => error!("session failed: {other}"),
            }
        }
        self.record_error(err);
        self.cancel.cancel();
    }
}
