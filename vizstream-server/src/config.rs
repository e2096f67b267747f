//! Configuration for the render node.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use vizstream_core::stream::{PixelFormat, RenderServiceConfig, WriteMode};
use vizstream_core::SessionConfig;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub render: RenderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to listen on.
    pub address: String,
    pub port: u16,
    /// Socket send/receive buffer size in bytes.
    pub buffer_size: u32,
    /// How long to wait for a client before re-arming the listener.
    pub accept_timeout_ms: u64,
    /// Minimum interval between pixel sends. `0` sends every frame.
    pub timestep_ms: u64,
    /// Offer zstd compression of pixel payloads.
    pub compression: bool,
    pub compression_level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Used until the client announces its viewport.
    pub width: u32,
    pub height: u32,
    /// "rgba8", "rgba16f" or "rgba32f".
    pub pixel_format: PixelFormat,
    pub target_fps: u32,
    /// Samples after which the image stops refining.
    pub max_samples: u32,
    /// Write the front buffer in place instead of swapping.
    pub blocking_writes: bool,
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
            address: "0.0.0.0".into(),
            port: 7000,
            buffer_size: 4 * 1024 * 1024,
            accept_timeout_ms: 30_000,
            timestep_ms: 0,
            compression: false,
            compression_level: 1,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            pixel_format: PixelFormat::Rgba8,
            target_fps: 30,
            max_samples: 64,
            blocking_writes: false,
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

impl ServerConfig {
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
            .with_timeout(Duration::from_millis(net.accept_timeout_ms.max(1)))
            .with_timestep(Duration::from_millis(net.timestep_ms))
            .with_resolution(self.render.width, self.render.height)
            .with_pixel_format(self.render.pixel_format)
            .with_compression(net.compression.then_some(net.compression_level))
    }

    pub fn to_service_config(&self) -> RenderServiceConfig {
        RenderServiceConfig {
            target_fps: self.render.target_fps.min(240),
            write_mode: if self.render.blocking_writes {
                WriteMode::Blocking
            } else {
                WriteMode::Swap
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&ServerConfig::default()).unwrap();
        assert!(text.contains("pixel_format = \"rgba8\""));
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 7000);
        assert_eq!(parsed.render.max_samples, 64);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: ServerConfig = toml::from_str("[render]\npixel_format = \"rgba32f\"\n").unwrap();
        assert_eq!(parsed.render.pixel_format, PixelFormat::Rgba32F);
        assert_eq!(parsed.render.width, 1280);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn session_config_carries_compression() {
        let mut cfg = ServerConfig::default();
        cfg.network.compression = true;
        cfg.network.compression_level = 5;
        let session = cfg.to_session_config();
        assert!(session.compression);
        assert_eq!(session.compression_level, 5);
        assert_eq!(session.endpoint(), "0.0.0.0:7000");
    }

    #[test]
    fn service_config_clamps_fps() {
        let mut cfg = ServerConfig::default();
        cfg.render.target_fps = 1000;
        cfg.render.blocking_writes = true;
        let svc = cfg.to_service_config();
        assert_eq!(svc.target_fps, 240);
        assert_eq!(svc.write_mode, WriteMode::Blocking);
    }
}
