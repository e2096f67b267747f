//! Configuration for the display client.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use vizstream_core::SessionConfig;
use vizstream_core::stream::PixelFormat;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub network: NetworkConfig,
    pub display: DisplayConfig,
    pub camera: OrbitConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Render node to connect to.
    pub address: String,
    pub port: u16,
    pub buffer_size: u32,
    /// Connect deadline and the longest wait for a frame.
    pub timeout_ms: u64,
    pub compression: bool,
    pub compression_level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Viewport size requested from the render node.
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub target_fps: u32,
    /// Stop after this many presented frames. `0` runs until Ctrl-C.
    pub frames: u64,
    /// Scene frame (simulation timestep) to request.
    pub scene_frame: i32,
}

/// Camera path: a circle around the origin, Z up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub distance: f32,
    pub elevation: f32,
    /// Degrees per presented frame. `0` keeps the camera still.
    pub degrees_per_frame: f32,
    /// Focal length in millimetres.
    pub lens: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: 7000,
            buffer_size: 4 * 1024 * 1024,
            timeout_ms: 5_000,
            compression: false,
            compression_level: 1,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            pixel_format: PixelFormat::Rgba8,
            target_fps: 60,
            frames: 0,
            scene_frame: 0,
        }
    }
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            distance: 5.0,
            elevation: 1.0,
            degrees_per_frame: 1.0,
            lens: 50.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ClientConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn to_session_config(&self) -> SessionConfig {
        let net = &self.network;
        SessionConfig::new(net.address.clone(), net.port)
            .with_buffer_size(net.buffer_size)
            .with_timeout(Duration::from_millis(net.timeout_ms.max(1)))
            .with_resolution(self.display.width, self.display.height)
            .with_pixel_format(self.display.pixel_format)
            .with_compression(net.compression.then_some(net.compression_level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&ClientConfig::default()).unwrap();
        let parsed: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 7000);
        assert_eq!(parsed.camera.distance, 5.0);
    }

    #[test]
    fn viewport_goes_into_session_config() {
        let mut cfg = ClientConfig::default();
        cfg.display.width = 800;
        cfg.display.height = 600;
        let session = cfg.to_session_config();
        assert_eq!((session.width, session.height), (800, 600));
        assert_eq!(session.timeout(), Duration::from_secs(5));
        assert!(!session.compression);
    }
}
