//! Session negotiation and small control payloads (bincode-encoded).
//!
//! ```text
//! client                         server
//!   │ ── HELLO (offer) ────────────▶ │
//!   │ ◀──────── HELLO_ACK (terms) ── │
//!   │        streaming ...           │
//!   │ ── RESIZE ───────────────────▶ │   either direction
//!   │ ◀─────────────── RESIZE_ACK ── │
//! ```

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::error::VizError;
use crate::stream::types::{PixelFormat, frame_len};

/// Wire protocol version. Bumped on any incompatible layout change.
pub const PROTOCOL_VERSION: u32 = 1;

/// Client offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub version: u32,
    /// Viewport size the client wants to display.
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub buffer_size: u32,
    pub compression: bool,
}

/// Terms both peers use for the rest of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloAck {
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub buffer_size: u32,
    pub compression: bool,
}

impl HelloAck {
    /// Server-side negotiation against a client offer.
    ///
    /// Resolution follows the client's viewport as long as a frame of that
    /// size fits in one PIXELS message, pixel format follows the renderer, buffer size is the smaller of the two, and compression is
    /// used only when both sides enabled it.
    pub fn negotiate(offer: &Hello, local: &Hello) -> Result<Self, VizError> {
        if offer.version != PROTOCOL_VERSION {
            return Err(VizError::UnsupportedVersion(offer.version));
        }
        // the frame store is allocated from these terms
        frame_len(offer.width, offer.height, local.format)?;
        Ok(Self {
            version: PROTOCOL_VERSION,
            width: offer.width,
            height: offer.height,
            format: local.format,
            buffer_size: offer.buffer_size.min(local.buffer_size),
            compression: offer.compression && local.compression,
        })
    }
}

/// Resolution change, sent by whichever peer initiates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

/// Scene frame (simulation timestep index) selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetFrame {
    pub frame: i32,
}

/// bincode helpers shared by every control payload.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, VizError> {
    Ok(bincode::serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, VizError> {
    Ok(bincode::deserialize(data)?)
}
