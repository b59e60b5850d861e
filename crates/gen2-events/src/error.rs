//! Error types for gen2-events.

use thiserror::Error;

/// Errors that can occur while decoding an event packet.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The packet type tag is outside the known range.
    #[error("invalid packet type: {0:#04x}")]
    InvalidPacketType(u8),

    /// Fewer bytes remain in the buffer than the header declares.
    #[error("truncated packet: need {needed} bytes, have {available}")]
    TruncatedPacket {
        /// Bytes the header says the packet occupies.
        needed: usize,
        /// Bytes remaining in the buffer.
        available: usize,
    },

    /// The header lengths are internally inconsistent.
    #[error(
        "length mismatch: {words} words cannot hold {static_len} static + {dynamic_len} dynamic bytes"
    )]
    LengthMismatch {
        /// Declared total footprint in 32-bit words.
        words: u8,
        /// Static field length implied by the packet type.
        static_len: usize,
        /// Declared dynamic payload length.
        dynamic_len: usize,
    },

    /// A trailing alignment pad byte was not zero.
    #[error("non-zero padding byte at offset {offset}")]
    NonZeroPadding {
        /// Offset of the offending byte from the start of the packet.
        offset: usize,
    },
}
