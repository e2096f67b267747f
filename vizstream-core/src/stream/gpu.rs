//! Display-side buffer bridge.
//!
//! The windowing/texture system is external; the core only needs to hand
//! it the current frame, expose a read-only handle, and trigger a draw.
//! [`HostMirror`] is the software implementation used when no graphics
//! context exists: it keeps the frame in host memory without copying.

use std::sync::Arc;

use crate::error::VizError;
use crate::stream::types::{PixelBuffer, PixelFormat};

/// Read-only description of the buffer currently resident on the display side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHandle {
    /// Backend-specific buffer name.
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Generation of the frame the buffer holds.
    pub generation: u64,
}

pub trait GpuBridge: Send {
    /// Make `frame` the displayed buffer's contents.
    fn upload(&mut self, frame: Arc<PixelBuffer>) -> Result<(), VizError>;

    /// Handle of the buffer kept in sync with the last upload.
    fn buffer_handle(&self) -> Option<BufferHandle>;

    /// Texture name, for backends that expose one.
    fn texture_id(&self) -> Option<u32>;

    /// Issue the display command for the current buffer.
    fn draw(&mut self) -> Result<(), VizError>;

    /// Reallocate display resources for a new resolution.
    fn resize(&mut self, width: u32, height: u32, format: PixelFormat) -> Result<(), VizError>;
}

// ── HostMirror ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct HostMirror {
    id: u64,
    shape: Option<(u32, u32, PixelFormat)>,
    frame: Option<Arc<PixelBuffer>>,
    uploads: u64,
    draws: u64,
}

impl HostMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// The frame that would be on screen.
    pub fn frame(&self) -> Option<&PixelBuffer> {
        self.frame.as_deref()
    }

    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    pub fn draws(&self) -> u64 {
        self.draws
    }
}

impl GpuBridge for HostMirror {
    fn upload(&mut self, frame: Arc<PixelBuffer>) -> Result<(), VizError> {
        let shape = (frame.width(), frame.height(), frame.format());
        if self.shape.is_some_and(|s| s != shape) {
            return Err(VizError::InvalidResolution {
                width: frame.width(),
                height: frame.height(),
            });
        }
        if self.shape.is_none() {
            self.shape = Some(shape);
            self.id += 1;
        }
        self.frame = Some(frame);
        self.uploads += 1;
        Ok(())
    }

    fn buffer_handle(&self) -> Option<BufferHandle> {
        let frame = self.frame.as_ref()?;
        Some(BufferHandle {
            id: self.id,
            width: frame.width(),
            height: frame.height(),
            format: frame.format(),
            generation: frame.generation(),
        })
    }

    fn texture_id(&self) -> Option<u32> {
        None
    }

    fn draw(&mut self) -> Result<(), VizError> {
        if self.frame.is_none() {
            return Err(VizError::Other("draw before first upload".into()));
        }
        self.draws += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32, format: PixelFormat) -> Result<(), VizError> {
        if width == 0 || height == 0 {
            return Err(VizError::InvalidResolution { width, height });
        }
        self.shape = Some((width, height, format));
        self.frame = None;
        self.id += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_then_draw() {
        let mut gpu = HostMirror::new();
        assert!(gpu.draw().is_err());
        assert!(gpu.buffer_handle().is_none());

        let mut frame = PixelBuffer::new(8, 8, PixelFormat::Rgba8).unwrap();
        frame.set_generation(3);
        gpu.upload(Arc::new(frame)).unwrap();
        gpu.draw().unwrap();

        let handle = gpu.buffer_handle().unwrap();
        assert_eq!((handle.width, handle.height, handle.generation), (8, 8, 3));
        assert_eq!(gpu.texture_id(), None);
        assert_eq!((gpu.uploads(), gpu.draws()), (1, 1));
    }

    #[test]
    fn upload_of_other_size_needs_resize() {
        let mut gpu = HostMirror::new();
        gpu.upload(Arc::new(PixelBuffer::new(8, 8, PixelFormat::Rgba8).unwrap()))
            .unwrap();
        let big = Arc::new(PixelBuffer::new(16, 8, PixelFormat::Rgba8).unwrap());
        assert!(gpu.upload(Arc::clone(&big)).is_err());

        gpu.resize(16, 8, PixelFormat::Rgba8).unwrap();
        gpu.upload(big).unwrap();
        assert_eq!(gpu.buffer_handle().unwrap().id, 2);
    }
}
