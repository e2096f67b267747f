//! Message kinds carried in the header `kind` byte.
//!
//! Uses a proper enum with `TryFrom`: unknown values are an error, never a panic.

use crate::error::VizError;
use std::fmt;

/// Every message understood by the vizstream wire protocol.
///
/// - `0x0_` — session lifecycle
/// - `0x1_` — streaming (camera, pixels, render state)
/// - `0x2_` — control (resolution, range, scene frame, render settings)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    // ── Lifecycle (0x0_) ─────────────────────────────────────────
    /// Client → server handshake offer.
    Hello = 0x01,
    /// Server → client negotiated parameters.
    HelloAck = 0x02,
    /// Graceful disconnect.
    Goodbye = 0x03,

    // ── Streaming (0x1_) ─────────────────────────────────────────
    /// 14-field camera state, fixed 100-byte payload.
    Camera = 0x10,
    /// One complete pixel frame.
    Pixels = 0x11,
    /// Render-side report sent after each frame.
    State = 0x12,

    // ── Control (0x2_) ───────────────────────────────────────────
    /// Resolution change request.
    Resize = 0x20,
    /// Acknowledges a resolution change.
    ResizeAck = 0x21,
    /// New range query.
    Range = 0x22,
    /// Scene frame (timestep index) selection.
    SetFrame = 0x23,
    /// Opaque render-settings blob.
    RenderData = 0x24,
}

impl TryFrom<u8> for MessageKind {
    type Error = VizError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageKind::Hello),
            0x02 => Ok(MessageKind::HelloAck),
            0x03 => Ok(MessageKind::Goodbye),
            0x10 => Ok(MessageKind::Camera),
            0x11 => Ok(MessageKind::Pixels),
            0x12 => Ok(MessageKind::State),
            0x20 => Ok(MessageKind::Resize),
            0x21 => Ok(MessageKind::ResizeAck),
            0x22 => Ok(MessageKind::Range),
            0x23 => Ok(MessageKind::SetFrame),
            0x24 => Ok(MessageKind::RenderData),
            _ => Err(VizError::UnknownVariant {
                type_name: "MessageKind",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Hello => "HELLO",
            MessageKind::HelloAck => "HELLO_ACK",
            MessageKind::Goodbye => "GOODBYE",
            MessageKind::Camera => "CAMERA",
            MessageKind::Pixels => "PIXELS",
            MessageKind::State => "STATE",
            MessageKind::Resize => "RESIZE",
            MessageKind::ResizeAck => "RESIZE_ACK",
            MessageKind::Range => "RANGE",
            MessageKind::SetFrame => "SET_FRAME",
            MessageKind::RenderData => "RENDER_DATA",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_from_known_values() {
        assert_eq!(MessageKind::try_from(0x10).unwrap(), MessageKind::Camera);
        assert_eq!(MessageKind::try_from(0x11).unwrap(), MessageKind::Pixels);
        assert_eq!(MessageKind::try_from(0x21).unwrap(), MessageKind::ResizeAck);
    }

    #[test]
    fn try_from_unknown_value() {
        let err = MessageKind::try_from(0x7f).unwrap_err();
        assert!(matches!(
            err,
            VizError::UnknownVariant { type_name: "MessageKind", value: 0x7f }
        ));
    }

    #[test]
    fn display_uses_wire_names() {
        assert_eq!(MessageKind::HelloAck.to_string(), "HELLO_ACK");
        assert_eq!(MessageKind::RenderData.to_string(), "RENDER_DATA");
    }
}
