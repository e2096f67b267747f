//! Frame-level machinery on top of the transport: pixel buffers, the
//! double-buffered store, the latest-camera cell, statistics and the two
//! frame loops.
//!
//! ```text
//!  render peer                                  display peer
//!  ┌──────────────┐                            ┌──────────────┐
//!  │ RenderBackend│                            │  GpuBridge   │
//!  │      ▲       │                            │      ▲       │
//!  │RenderService │◀── CAMERA ─── Session ─────│  ViewerLoop  │
//!  │      │       │─── PIXELS/STATE ──────────▶│              │
//!  └──────────────┘                            └──────────────┘
//! ```

pub mod backend;
pub mod camera;
pub mod client;
pub mod gpu;
pub mod service;
pub mod stats;
pub mod store;
pub mod throughput;
pub mod types;

pub use backend::{RenderBackend, RenderOutput, RenderRequest, TestPatternBackend};
pub use camera::CameraCell;
pub use client::{FrameOutcome, ViewerLoop};
pub use gpu::{BufferHandle, GpuBridge, HostMirror};
pub use service::{RenderService, RenderServiceConfig};
pub use stats::{FpsCounter, Statistics, StatsSnapshot};
pub use store::{FrameBufferStore, WriteMode};
pub use throughput::ThroughputMeter;
pub use types::{PixelBuffer, PixelFormat, frame_len};
