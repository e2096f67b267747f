//! Domain-specific error types for the vizstream protocol.
//!
//! All fallible operations return `Result<T, VizError>`. Every error maps
//! onto a coarse [`ErrorKind`] with a stable negative status code, which is
//! what the session records as its sticky "last error".

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the vizstream core.
#[derive(Debug, Error)]
pub enum VizError {
    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// Binding, listening or connecting failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The peer address could not be resolved or routed to.
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The session was closed locally; no further operations succeed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The remote peer went away mid-stream.
    #[error("peer disconnected")]
    PeerDisconnected,

    /// An internal channel between the session and its transport tasks closed.
    #[error("channel closed")]
    ChannelClosed,

    // ── Framing Errors ───────────────────────────────────────────
    /// Received bytes that do not start with the `VZS1` magic.
    #[error("invalid magic bytes: expected VZS1")]
    InvalidMagic,

    /// A field in the message header could not be parsed.
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    /// The payload failed checksum verification.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Frame size exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    // ── Protocol Errors ──────────────────────────────────────────
    /// The protocol version offered by the peer is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u32),

    /// A message arrived that the current session state does not allow.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// A payload decoded to something structurally invalid.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Encoding or decoding of a payload failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    // ── Application Errors ───────────────────────────────────────
    /// A range query failed validation.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// A requested resolution has a zero dimension or overflows.
    #[error("invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    /// A camera update failed validation and was rejected as a whole.
    #[error("invalid camera: {0}")]
    InvalidCamera(&'static str),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── ErrorKind ────────────────────────────────────────────────────

/// Coarse classification of a [`VizError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Timeout,
    Unreachable,
    Transport,
    InvalidRange,
    InvalidResolution,
    InvalidCamera,
}

impl ErrorKind {
    /// Numeric status code. Success is `0`; every kind is negative.
    pub const fn code(self) -> i32 {
        match self {
            ErrorKind::Connection => -1,
            ErrorKind::Timeout => -2,
            ErrorKind::Unreachable => -3,
            ErrorKind::Transport => -4,
            ErrorKind::InvalidRange => -5,
            ErrorKind::InvalidResolution => -6,
            ErrorKind::InvalidCamera => -7,
        }
    }

    /// Inverse of [`code`](Self::code). Returns `None` for `0` and unknown codes.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(ErrorKind::Connection),
            -2 => Some(ErrorKind::Timeout),
            -3 => Some(ErrorKind::Unreachable),
            -4 => Some(ErrorKind::Transport),
            -5 => Some(ErrorKind::InvalidRange),
            -6 => Some(ErrorKind::InvalidResolution),
            -7 => Some(ErrorKind::InvalidCamera),
            _ => None,
        }
    }
}

impl VizError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VizError::Connection(_)
            | VizError::ConnectionFailed(_)
            | VizError::ConnectionClosed
            | VizError::PeerDisconnected
            | VizError::ChannelClosed => ErrorKind::Connection,
            VizError::Timeout(_) => ErrorKind::Timeout,
            VizError::Unreachable(_) => ErrorKind::Unreachable,
            VizError::InvalidMagic
            | VizError::InvalidHeader(_)
            | VizError::ChecksumMismatch
            | VizError::FrameTooLarge { .. }
            | VizError::UnknownVariant { .. }
            | VizError::UnsupportedVersion(_)
            | VizError::ProtocolViolation(_)
            | VizError::Malformed(_)
            | VizError::Encoding(_)
            | VizError::Other(_) => ErrorKind::Transport,
            VizError::InvalidRange(_) => ErrorKind::InvalidRange,
            VizError::InvalidResolution { .. } => ErrorKind::InvalidResolution,
            VizError::InvalidCamera(_) => ErrorKind::InvalidCamera,
        }
    }

    /// Shorthand for `self.kind().code()`.
    pub fn code(&self) -> i32 {
        self.kind().code()
    }

    /// Whether the session cannot continue after this error.
    ///
    /// Framing errors are fatal because the byte stream can no longer be
    /// trusted. Payload-level errors, timeouts and validation failures
    /// only cost the current frame.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VizError::Connection(_)
                | VizError::ConnectionFailed(_)
                | VizError::Unreachable(_)
                | VizError::ConnectionClosed
                | VizError::PeerDisconnected
                | VizError::ChannelClosed
                | VizError::InvalidMagic
                | VizError::InvalidHeader(_)
                | VizError::ChecksumMismatch
                | VizError::FrameTooLarge { .. }
                | VizError::UnsupportedVersion(_)
        )
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for VizError {
    fn from(s: String) -> Self {
        VizError::Other(s)
    }
}

impl From<&str> for VizError {
    fn from(s: &str) -> Self {
        VizError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for VizError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        VizError::ChannelClosed
    }
}

impl From<Box<bincode::ErrorKind>> for VizError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        VizError::Encoding(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = VizError::InvalidMagic;
        assert!(e.to_string().contains("VZS1"));

        let e = VizError::FrameTooLarge { size: 1000, max: 500 };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("500"));

        let e = VizError::InvalidResolution { width: 0, height: 600 };
        assert_eq!(e.to_string(), "invalid resolution 0x600");
    }

    #[test]
    fn kinds_and_codes() {
        assert_eq!(VizError::ConnectionClosed.kind(), ErrorKind::Connection);
        assert_eq!(VizError::Timeout(Duration::from_millis(5)).code(), -2);
        assert_eq!(VizError::Unreachable("x".into()).code(), -3);
        assert_eq!(VizError::ChecksumMismatch.kind(), ErrorKind::Transport);
        assert_eq!(VizError::InvalidRange("min > max".into()).code(), -5);
        assert_eq!(
            VizError::InvalidResolution { width: 0, height: 0 }.code(),
            -6
        );
    }

    #[test]
    fn code_roundtrip() {
        for kind in [
            ErrorKind::Connection,
            ErrorKind::Timeout,
            ErrorKind::Unreachable,
            ErrorKind::Transport,
            ErrorKind::InvalidRange,
            ErrorKind::InvalidResolution,
            ErrorKind::InvalidCamera,
        ] {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(0), None);
    }

    #[test]
    fn fatal_classification() {
        assert!(VizError::PeerDisconnected.is_fatal());
        assert!(VizError::ChecksumMismatch.is_fatal());
        assert!(!VizError::Timeout(Duration::from_secs(1)).is_fatal());
        assert!(!VizError::Malformed("short".into()).is_fatal());
        assert!(!VizError::InvalidRange("step".into()).is_fatal());
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: VizError = io_err.into();
        assert!(matches!(e, VizError::Connection(_)));
        assert!(e.is_fatal());
    }

    #[test]
    fn from_string() {
        let e: VizError = "something broke".into();
        assert!(matches!(e, VizError::Other(_)));
    }
}
