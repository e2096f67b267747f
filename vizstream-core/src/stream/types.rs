//! Pixel formats and the frame buffer value type.

use serde::{Deserialize, Serialize};

use crate::error::VizError;
use crate::packet::MAX_PAYLOAD_SIZE;
use crate::protocol::pixels::PixelHeader;

// ── PixelFormat ──────────────────────────────────────────────────

/// Channel layout of a rendered frame. Always four channels (RGBA).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit unsigned per channel.
    #[default]
    Rgba8 = 0,
    /// 16-bit half float per channel.
    Rgba16F = 1,
    /// 32-bit float per channel.
    Rgba32F = 2,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgba16F => 8,
            PixelFormat::Rgba32F => 16,
        }
    }

    /// Format for a per-channel bit depth of 8, 16 or 32.
    pub fn from_bit_depth(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(PixelFormat::Rgba8),
            16 => Some(PixelFormat::Rgba16F),
            32 => Some(PixelFormat::Rgba32F),
            _ => None,
        }
    }

    pub const fn bit_depth(self) -> u32 {
        match self {
            PixelFormat::Rgba8 => 8,
            PixelFormat::Rgba16F => 16,
            PixelFormat::Rgba32F => 32,
        }
    }
}

impl TryFrom<u8> for PixelFormat {
    type Error = VizError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PixelFormat::Rgba8),
            1 => Ok(PixelFormat::Rgba16F),
            2 => Ok(PixelFormat::Rgba32F),
            _ => Err(VizError::UnknownVariant {
                type_name: "PixelFormat",
                value: value as u64,
            }),
        }
    }
}

/// Largest uncompressed frame that still fits in one PIXELS message.
pub const MAX_FRAME_BYTES: usize = MAX_PAYLOAD_SIZE - PixelHeader::SIZE;

/// Byte length of a `width × height` frame, or `InvalidResolution` if a
/// dimension is zero or the frame would not fit in a PIXELS message.
pub fn frame_len(width: u32, height: u32, format: PixelFormat) -> Result<usize, VizError> {
    let invalid = VizError::InvalidResolution { width, height };
    if width == 0 || height == 0 {
        return Err(invalid);
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(format.bytes_per_pixel()))
        .filter(|&len| len <= MAX_FRAME_BYTES)
        .ok_or(invalid)
}

// ── PixelBuffer ──────────────────────────────────────────────────

/// One complete frame.
///
/// `data` always holds exactly `width * height * bpp` bytes. Frames are
/// replaced as a whole; there is no API for patching a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    generation: u64,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// A zero-filled frame at generation 0.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self, VizError> {
        let len = frame_len(width, height, format)?;
        Ok(Self {
            width,
            height,
            format,
            generation: 0,
            data: vec![0u8; len],
        })
    }

    /// Wrap existing pixel data, checking its length.
    pub fn from_data(
        width: u32,
        height: u32,
        format: PixelFormat,
        generation: u64,
        data: Vec<u8>,
    ) -> Result<Self, VizError> {
        let expected = frame_len(width, height, format)?;
        if data.len() != expected {
            return Err(VizError::Malformed(format!(
                "pixel data is {} bytes, {width}x{height} {format:?} needs {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            generation,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel bytes. The length cannot change through this slice.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Reallocate for a new size/format and zero the contents. The
    /// generation counter carries over so ordering survives a resize.
    pub fn reallocate(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<(), VizError> {
        let len = frame_len(width, height, format)?;
        self.width = width;
        self.height = height;
        self.format = format;
        self.data.clear();
        self.data.resize(len, 0);
        Ok(())
    }

    /// Overwrite contents from `src`, which must have the same shape.
    pub fn copy_from(&mut self, src: &PixelBuffer) -> Result<(), VizError> {
        if src.dimensions() != self.dimensions() || src.format != self.format {
            return Err(VizError::InvalidResolution {
                width: src.width,
                height: src.height,
            });
        }
        self.data.copy_from_slice(&src.data);
        self.generation = src.generation;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_pixel() {
        assert_eq!(PixelFormat::Rgba8.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgba16F.bytes_per_pixel(), 8);
        assert_eq!(PixelFormat::Rgba32F.bytes_per_pixel(), 16);
        assert_eq!(PixelFormat::from_bit_depth(16), Some(PixelFormat::Rgba16F));
        assert_eq!(PixelFormat::from_bit_depth(24), None);
    }

    #[test]
    fn new_buffer_is_sized() {
        let buf = PixelBuffer::new(800, 600, PixelFormat::Rgba8).unwrap();
        assert_eq!(buf.byte_len(), 800 * 600 * 4);
        assert_eq!(buf.generation(), 0);
    }

    #[test]
    fn zero_dimension_rejected() {
        assert!(matches!(
            PixelBuffer::new(0, 600, PixelFormat::Rgba8),
            Err(VizError::InvalidResolution { width: 0, height: 600 })
        ));
    }

    #[test]
    fn frame_must_fit_one_message() {
        assert_eq!(
            frame_len(16_000, 16_000, PixelFormat::Rgba8).unwrap(),
            1_024_000_000
        );
        assert!(matches!(
            frame_len(16_400, 16_400, PixelFormat::Rgba8),
            Err(VizError::InvalidResolution { width: 16_400, height: 16_400 })
        ));
        assert!(frame_len(100_000, 100_000, PixelFormat::Rgba8).is_err());
        // a size that fits as RGBA8 is four times too large as RGBA32F
        assert!(frame_len(16_000, 16_000, PixelFormat::Rgba32F).is_err());
        assert!(PixelBuffer::new(u32::MAX, u32::MAX, PixelFormat::Rgba32F).is_err());
    }

    #[test]
    fn from_data_checks_length() {
        assert!(PixelBuffer::from_data(2, 2, PixelFormat::Rgba8, 1, vec![0; 15]).is_err());
        let buf = PixelBuffer::from_data(2, 2, PixelFormat::Rgba8, 1, vec![0; 16]).unwrap();
        assert_eq!(buf.generation(), 1);
    }

    #[test]
    fn copy_from_requires_same_shape() {
        let mut dst = PixelBuffer::new(4, 4, PixelFormat::Rgba8).unwrap();
        let src = PixelBuffer::new(8, 4, PixelFormat::Rgba8).unwrap();
        assert!(dst.copy_from(&src).is_err());
    }
}
