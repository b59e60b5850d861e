//! Error types for gen2-commands.

use thiserror::Error;

/// Errors raised while encoding a Gen2 command.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The mask buffer does not cover the declared bit length.
    #[error("mask of {mask_bytes} bytes cannot cover {bit_length} bits")]
    MaskLengthMismatch {
        /// Bytes supplied in the mask buffer.
        mask_bytes: usize,
        /// Bits the command declares.
        bit_length: usize,
    },

    /// An authenticate message exceeds the air-interface limit.
    #[error("message of {bits} bits exceeds the {max}-bit limit")]
    MessageTooLong {
        /// Bits requested.
        bits: usize,
        /// Protocol maximum.
        max: usize,
    },

    /// A read command asked for zero words.
    #[error("read command with zero word count")]
    ZeroLengthRead,

    /// A lock mask or action does not fit in its 10-bit field.
    #[error("lock payload field {value:#x} exceeds 10 bits")]
    InvalidLockPayload {
        /// Offending field value.
        value: u16,
    },

    /// The serialized command exceeds the per-command byte limit.
    #[error("encoded command of {bytes} bytes exceeds the {max}-byte limit")]
    CommandTooLong {
        /// Bytes the command serialized to.
        bytes: usize,
        /// Per-command maximum.
        max: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = EncodeError::MaskLengthMismatch {
            mask_bytes: 2,
            bit_length: 24,
        };
        assert!(err.to_string().contains("24 bits"));

        let err = EncodeError::ZeroLengthRead;
        assert!(err.to_string().contains("zero word count"));
    }
}
