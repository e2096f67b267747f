//! PIXELS payload: a 24-byte frame sub-header followed by pixel data.
//!
//! ```text
//! generation  u64
//! width       u32
//! height      u32
//! format      u8     PixelFormat
//! reserved    [u8; 7]
//! data        width × height × bpp bytes (zstd stream if COMPRESSED)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::VizError;
use crate::flags::FrameFlags;
use crate::stream::types::{PixelBuffer, PixelFormat, frame_len};

/// Frame metadata preceding the pixel bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelHeader {
    pub generation: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl PixelHeader {
    /// Encoded size on the wire.
    pub const SIZE: usize = 24;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(&self.generation.to_le_bytes());
        buf[8..12].copy_from_slice(&self.width.to_le_bytes());
        buf[12..16].copy_from_slice(&self.height.to_le_bytes());
        buf[16] = self.format as u8;
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, VizError> {
        if data.len() < Self::SIZE {
            return Err(VizError::Malformed(format!(
                "pixel header too short: {} < {}",
                data.len(),
                Self::SIZE
            )));
        }
        let mut buf = data;
        let generation = buf.get_u64_le();
        let width = buf.get_u32_le();
        let height = buf.get_u32_le();
        let format = PixelFormat::try_from(buf.get_u8())?;
        Ok(Self {
            generation,
            width,
            height,
            format,
        })
    }
}

/// Encode a frame into a PIXELS payload.
///
/// `compression` is a zstd level; `None` sends raw bytes. Returns the
/// flags to put in the message header alongside the payload.
pub fn encode_pixels(
    buffer: &PixelBuffer,
    compression: Option<i32>,
) -> Result<(FrameFlags, Bytes), VizError> {
    let header = PixelHeader {
        generation: buffer.generation(),
        width: buffer.width(),
        height: buffer.height(),
        format: buffer.format(),
    };

    let (flags, body) = match compression {
        Some(level) => {
            let packed = zstd::bulk::compress(buffer.data(), level)
                .map_err(|e| VizError::Encoding(format!("zstd encode failed: {e}")))?;
            (FrameFlags::COMPRESSED, packed)
        }
        None => (FrameFlags::empty(), Vec::new()),
    };

    let data: &[u8] = if flags.contains(FrameFlags::COMPRESSED) {
        &body
    } else {
        buffer.data()
    };
    let mut out = BytesMut::with_capacity(PixelHeader::SIZE + data.len());
    out.put_slice(&header.encode());
    out.put_slice(data);
    Ok((flags, out.freeze()))
}

/// Decode a PIXELS payload into an owned frame.
///
/// The decoded byte count must match the sub-header's dimensions exactly.
pub fn decode_pixels(flags: FrameFlags, payload: &[u8]) -> Result<PixelBuffer, VizError> {
    let header = PixelHeader::decode(payload)?;
    let expected = frame_len(header.width, header.height, header.format)?;
    let body = &payload[PixelHeader::SIZE..];

    let data = if flags.contains(FrameFlags::COMPRESSED) {
        zstd::bulk::decompress(body, expected)
            .map_err(|e| VizError::Malformed(format!("zstd decode failed: {e}")))?
    } else {
        body.to_vec()
    };

    PixelBuffer::from_data(
        header.width,
        header.height,
        header.format,
        header.generation,
        data,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, height, PixelFormat::Rgba8).unwrap();
        for (i, px) in buf.data_mut().chunks_mut(4).enumerate() {
            px.copy_from_slice(&[(i % 256) as u8, 0x40, 0x80, 0xff]);
        }
        buf.set_generation(42);
        buf
    }

    #[test]
    fn raw_frame() {
        let frame = gradient(16, 8);
        let (flags, payload) = encode_pixels(&frame, None).unwrap();
        assert!(flags.is_empty());
        assert_eq!(payload.len(), PixelHeader::SIZE + 16 * 8 * 4);
        assert_eq!(decode_pixels(flags, &payload).unwrap(), frame);
    }

    #[test]
    fn compressed_frame_shrinks() {
        let frame = gradient(64, 64);
        let (flags, payload) = encode_pixels(&frame, Some(1)).unwrap();
        assert!(flags.contains(FrameFlags::COMPRESSED));
        assert!(payload.len() < frame.byte_len());
        assert_eq!(decode_pixels(flags, &payload).unwrap(), frame);
    }

    #[test]
    fn truncated_body_is_malformed() {
        let frame = gradient(4, 4);
        let (flags, payload) = encode_pixels(&frame, None).unwrap();
        let err = decode_pixels(flags, &payload[..payload.len() - 4]).unwrap_err();
        assert!(matches!(err, VizError::Malformed(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn zero_width_header_rejected() {
        let header = PixelHeader {
            generation: 1,
            width: 0,
            height: 4,
            format: PixelFormat::Rgba8,
        };
        assert!(matches!(
            decode_pixels(FrameFlags::empty(), &header.encode()),
            Err(VizError::InvalidResolution { .. })
        ));
    }
}
