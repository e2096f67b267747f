//! Session parameters shared by both peers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::VizError;
use crate::stream::types::{PixelFormat, frame_len};

/// Everything needed to open a session.
///
/// For a server, `address:port` is the listen address and `width`/`height`
/// are only a fallback; the client's viewport wins the negotiation. For a
/// client, `address:port` is the server to dial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub address: String,
    pub port: u16,
    /// Socket send/receive buffer size in bytes.
    pub buffer_size: u32,
    /// Connect/accept deadline and the wait limit for blocking receives.
    pub timeout_ms: u64,
    /// Minimum interval between pixel sends. `0` disables rate limiting.
    pub timestep_ms: u64,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// Offer zstd compression of pixel payloads.
    pub compression: bool,
    pub compression_level: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: 7000,
            buffer_size: 4 * 1024 * 1024,
            timeout_ms: 5_000,
            timestep_ms: 0,
            width: 1280,
            height: 720,
            pixel_format: PixelFormat::Rgba8,
            compression: false,
            compression_level: 1,
        }
    }
}

impl SessionConfig {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_buffer_size(mut self, bytes: u32) -> Self {
        self.buffer_size = bytes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_timestep(mut self, timestep: Duration) -> Self {
        self.timestep_ms = timestep.as_millis() as u64;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    pub fn with_compression(mut self, level: Option<i32>) -> Self {
        self.compression = level.is_some();
        if let Some(level) = level {
            self.compression_level = level;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn timestep(&self) -> Duration {
        Duration::from_millis(self.timestep_ms)
    }

    /// `host:port` string for resolution.
    pub fn endpoint(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }

    pub fn validate(&self) -> Result<(), VizError> {
        frame_len(self.width, self.height, self.pixel_format)?;
        if self.timeout_ms == 0 {
            return Err(VizError::Other("timeout must be non-zero".into()));
        }
        if self.buffer_size == 0 {
            return Err(VizError::Other("buffer_size must be non-zero".into()));
        }
        Ok(())
    }
}
