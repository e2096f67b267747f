//! A framed protocol message: header plus payload.

use bytes::Bytes;

use crate::error::VizError;
use crate::flags::FrameFlags;
use crate::header::{HEADER_SIZE, MessageHeader};
use crate::message::MessageKind;

/// Largest payload the codec accepts (1 GiB).
///
/// An 8K RGBA32F frame is ~530 MB uncompressed, so this leaves room for
/// every supported resolution while rejecting garbage length fields.
pub const MAX_PAYLOAD_SIZE: usize = 1 << 30;

/// Largest encoded message.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// One message as it travels through the codec.
///
/// The sequence number is stamped by the encoder; messages built locally
/// carry `0` until they are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: MessageHeader,
    payload: Bytes,
}

impl Message {
    /// Build a message and compute its checksum.
    pub fn new(
        kind: MessageKind,
        flags: FrameFlags,
        payload: impl Into<Bytes>,
    ) -> Result<Self, VizError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(VizError::FrameTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let header = MessageHeader {
            kind,
            flags,
            sequence: 0,
            payload_len: payload.len() as u32,
            checksum: Self::checksum(&payload),
        };
        Ok(Self { header, payload })
    }

    /// A message with no payload.
    pub fn empty(kind: MessageKind) -> Self {
        Self {
            header: MessageHeader {
                kind,
                flags: FrameFlags::empty(),
                sequence: 0,
                payload_len: 0,
                checksum: 0,
            },
            payload: Bytes::new(),
        }
    }

    /// Reassemble a message read off the wire. Does not verify the checksum.
    pub(crate) fn from_parts(header: MessageHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// First four bytes of the payload's blake3 hash, `0` for empty payloads.
    pub fn checksum(payload: &[u8]) -> u32 {
        if payload.is_empty() {
            return 0;
        }
        let hash = blake3::hash(payload);
        let b = hash.as_bytes();
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    /// Whether the stored checksum matches the payload.
    pub fn verify(&self) -> bool {
        Self::checksum(&self.payload) == self.header.checksum
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn kind(&self) -> MessageKind {
        self.header.kind
    }

    pub fn flags(&self) -> FrameFlags {
        self.header.flags
    }

    pub fn sequence(&self) -> u64 {
        self.header.sequence
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.header.sequence = sequence;
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload without copying.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Header plus payload length.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_zero_for_empty() {
        assert_eq!(Message::checksum(&[]), 0);
        let msg = Message::empty(MessageKind::Goodbye);
        assert!(msg.verify());
        assert_eq!(msg.encoded_len(), HEADER_SIZE);
    }

    #[test]
    fn new_computes_checksum() {
        let msg = Message::new(MessageKind::RenderData, FrameFlags::empty(), vec![1u8, 2, 3])
            .unwrap();
        assert_eq!(msg.header().payload_len, 3);
        assert_ne!(msg.header().checksum, 0);
        assert!(msg.verify());
    }

    #[test]
    fn tampered_payload_fails_verify() {
        let msg = Message::new(MessageKind::RenderData, FrameFlags::empty(), vec![9u8; 16])
            .unwrap();
        let tampered = Message::from_parts(*msg.header(), Bytes::from(vec![8u8; 16]));
        assert!(!tampered.verify());
    }
}
