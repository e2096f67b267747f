//! Per-message header flags.

use bitflags::bitflags;

bitflags! {
    /// Flags carried in the one-byte `flags` field of every message header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FrameFlags: u8 {
        /// PIXELS payload data is zstd-compressed.
        const COMPRESSED = 0x01;
        /// CAMERA update that also restarts progressive accumulation.
        const RESET      = 0x02;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_bits_are_rejected() {
        assert!(FrameFlags::from_bits(0x80).is_none());
        assert_eq!(
            FrameFlags::from_bits(0x03),
            Some(FrameFlags::COMPRESSED | FrameFlags::RESET)
        );
    }
}
