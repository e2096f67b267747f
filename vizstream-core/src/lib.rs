//! # vizstream-core
//!
//! Camera/pixel synchronization for remote visualization: a render node
//! streams progressively refined frames to a display client, which
//! streams camera changes back.
//!
//! This crate contains:
//! - **Wire format**: `MessageHeader`, `Message`, `MessageKind`, `FrameFlags`
//! - **Codec**: `VizCodec` for framed TCP I/O via `tokio_util`
//! - **Protocol payloads**: camera, pixels, state, range, handshake
//! - **Network**: `Session` with background reader/writer tasks
//! - **Stream**: frame store, camera cell, statistics, render/viewer loops
//! - **Error**: `VizError`, a `thiserror`-based error hierarchy with
//!   stable negative status codes

pub mod codec;
pub mod config;
pub mod error;
pub mod flags;
pub mod header;
pub mod message;
pub mod network;
pub mod packet;
pub mod protocol;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────

pub use codec::VizCodec;
pub use config::SessionConfig;
pub use error::{ErrorKind, VizError};
pub use flags::FrameFlags;
pub use header::{HEADER_SIZE, MAGIC, MessageHeader};
pub use message::MessageKind;
pub use network::{Role, Session, SessionListener};
pub use packet::{MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, Message};
pub use protocol::{CameraState, DataBounds, RangeMode, RangeQuery, RenderState};
pub use stream::{
    FrameBufferStore, FrameOutcome, GpuBridge, HostMirror, PixelBuffer, PixelFormat,
    RenderBackend, RenderService, RenderServiceConfig, Statistics, TestPatternBackend,
    ViewerLoop, WriteMode,
};
