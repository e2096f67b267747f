//! `tokio_util` codec for framed vizstream I/O.
//!
//! The decoder never yields a partial message: it waits until the header
//! and the full payload are buffered, reserving the remaining capacity as
//! soon as the header announces the length.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::VizError;
use crate::header::{HEADER_SIZE, MessageHeader};
use crate::packet::{MAX_PAYLOAD_SIZE, Message};

/// Length-prefixed, checksummed message codec.
#[derive(Debug)]
pub struct VizCodec {
    max_payload: usize,
    next_sequence: u64,
    last_received: Option<u64>,
}

impl VizCodec {
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_SIZE)
    }

    /// Override the payload limit (clamped to [`MAX_PAYLOAD_SIZE`]).
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            max_payload: max_payload.min(MAX_PAYLOAD_SIZE),
            next_sequence: 1,
            last_received: None,
        }
    }
}

impl Default for VizCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for VizCodec {
    type Item = Message;
    type Error = VizError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = MessageHeader::decode(&src[..HEADER_SIZE])?;
        let payload_len = header.payload_len as usize;
        if payload_len > self.max_payload {
            return Err(VizError::FrameTooLarge {
                size: payload_len,
                max: self.max_payload,
            });
        }

        let total = HEADER_SIZE + payload_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        let payload = frame.split_off(HEADER_SIZE).freeze();
        let message = Message::from_parts(header, payload);
        if !message.verify() {
            return Err(VizError::ChecksumMismatch);
        }

        if let Some(last) = self.last_received {
            if header.sequence <= last {
                return Err(VizError::ProtocolViolation("sequence number went backwards"));
            }
        }
        self.last_received = Some(header.sequence);

        Ok(Some(message))
    }
}

impl Encoder<Message> for VizCodec {
    type Error = VizError;

    fn encode(&mut self, mut item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload().len() > self.max_payload {
            return Err(VizError::FrameTooLarge {
                size: item.payload().len(),
                max: self.max_payload,
            });
        }
        item.set_sequence(self.next_sequence);
        self.next_sequence += 1;

        dst.reserve(item.encoded_len());
        dst.put_slice(&item.header().encode());
        dst.put_slice(item.payload());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::FrameFlags;
    use crate::message::MessageKind;

    fn encode(codec: &mut VizCodec, msg: Message) -> BytesMut {
        let mut buf = BytesMut::new();
        codec.encode(msg, &mut buf).unwrap();
        buf
    }

    #[test]
    fn partial_frames_are_never_yielded() {
        let mut tx = VizCodec::new();
        let mut rx = VizCodec::new();
        let msg = Message::new(MessageKind::RenderData, FrameFlags::empty(), vec![7u8; 1000])
            .unwrap();
        let wire = encode(&mut tx, msg);

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&wire[..10]);
        assert!(rx.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&wire[10..500]);
        assert!(rx.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&wire[500..]);

        let decoded = rx.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.kind(), MessageKind::RenderData);
        assert_eq!(decoded.payload(), &[7u8; 1000][..]);
        assert_eq!(decoded.sequence(), 1);
        assert!(buf.is_empty());
    }

    #[test]
    fn back_to_back_messages() {
        let mut tx = VizCodec::new();
        let mut rx = VizCodec::new();
        let mut buf = encode(&mut tx, Message::empty(MessageKind::ResizeAck));
        buf.extend_from_slice(&encode(&mut tx, Message::empty(MessageKind::Goodbye)));

        assert_eq!(
            rx.decode(&mut buf).unwrap().unwrap().kind(),
            MessageKind::ResizeAck
        );
        let second = rx.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.kind(), MessageKind::Goodbye);
        assert_eq!(second.sequence(), 2);
        assert!(rx.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn corrupted_payload_is_a_checksum_error() {
        let mut tx = VizCodec::new();
        let msg = Message::new(MessageKind::RenderData, FrameFlags::empty(), vec![1u8; 64])
            .unwrap();
        let mut buf = encode(&mut tx, msg);
        let last = buf.len() - 1;
        buf[last] ^= 0xff;

        let err = VizCodec::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, VizError::ChecksumMismatch));
        assert!(err.is_fatal());
    }

    #[test]
    fn oversized_length_rejected_before_buffering() {
        let mut tx = VizCodec::new();
        let msg = Message::new(MessageKind::RenderData, FrameFlags::empty(), vec![0u8; 128])
            .unwrap();
        let mut buf = encode(&mut tx, msg);
        buf.truncate(HEADER_SIZE);

        let err = VizCodec::with_max_payload(64).decode(&mut buf).unwrap_err();
        assert!(matches!(err, VizError::FrameTooLarge { size: 128, max: 64 }));
    }

    #[test]
    fn replayed_sequence_is_a_violation() {
        let mut tx = VizCodec::new();
        let wire = encode(&mut tx, Message::empty(MessageKind::ResizeAck));
        let mut rx = VizCodec::new();

        let mut buf = wire.clone();
        rx.decode(&mut buf).unwrap().unwrap();
        let mut buf = wire;
        assert!(matches!(
            rx.decode(&mut buf),
            Err(VizError::ProtocolViolation(_))
        ));
    }

    #[tokio::test]
    async fn framed_read_across_short_reads() {
        use futures::StreamExt;
        use tokio_util::codec::FramedRead;

        let mut tx = VizCodec::new();
        let mut wire = encode(
            &mut tx,
            Message::new(MessageKind::SetFrame, FrameFlags::empty(), vec![1, 2, 3]).unwrap(),
        );
        wire.extend_from_slice(&encode(&mut tx, Message::empty(MessageKind::Goodbye)));

        let mock = tokio_test::io::Builder::new()
            .read(&wire[..7])
            .read(&wire[7..30])
            .read(&wire[30..])
            .build();
        let mut reader = FramedRead::new(mock, VizCodec::new());

        let first = reader.next().await.unwrap().unwrap();
        assert_eq!(first.kind(), MessageKind::SetFrame);
        assert_eq!(first.payload(), &[1, 2, 3]);
        let second = reader.next().await.unwrap().unwrap();
        assert_eq!(second.kind(), MessageKind::Goodbye);
        assert!(reader.next().await.is_none());
    }
}
