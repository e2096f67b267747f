//! Fixed 24-byte message header.
//!
//! ```text
//! offset  size  field
//! 0       4     magic        "VZS1"
//! 4       1     kind         MessageKind
//! 5       1     flags        FrameFlags
//! 6       2     reserved     (zero)
//! 8       8     sequence     per-direction counter
//! 16      4     payload_len  bytes following the header
//! 20      4     checksum     blake3(payload)[0..4], 0 when empty
//! ```
//!
//! All integers are little-endian.

use bytes::Buf;

use crate::error::VizError;
use crate::flags::FrameFlags;
use crate::message::MessageKind;

/// Magic bytes opening every message.
pub const MAGIC: [u8; 4] = *b"VZS1";

/// Encoded header size on the wire.
pub const HEADER_SIZE: usize = 24;

// ── MessageHeader ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub kind: MessageKind,
    pub flags: FrameFlags,
    pub sequence: u64,
    pub payload_len: u32,
    pub checksum: u32,
}

impl MessageHeader {
    /// Encoded size on the wire.
    pub const SIZE: usize = HEADER_SIZE;

    /// Serialize to bytes (little-endian).
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4] = self.kind as u8;
        buf[5] = self.flags.bits();
        // buf[6..8] reserved
        buf[8..16].copy_from_slice(&self.sequence.to_le_bytes());
        buf[16..20].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[20..24].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Deserialize from bytes.
    ///
    /// Validates magic, kind and flags; payload length limits are the
    /// codec's concern.
    pub fn decode(data: &[u8]) -> Result<Self, VizError> {
        if data.len() < Self::SIZE {
            return Err(VizError::InvalidHeader("header too short"));
        }
        if data[0..4] != MAGIC {
            return Err(VizError::InvalidMagic);
        }
        let kind = MessageKind::try_from(data[4])?;
        let flags =
            FrameFlags::from_bits(data[5]).ok_or(VizError::InvalidHeader("unknown flag bits"))?;

        let mut rest = &data[8..Self::SIZE];
        let sequence = rest.get_u64_le();
        let payload_len = rest.get_u32_le();
        let checksum = rest.get_u32_le();

        Ok(Self {
            kind,
            flags,
            sequence,
            payload_len,
            checksum,
        })
    }
}
