//! Bit-level Gen2 command encoding.
//!
//! Gen2 commands are bit-aligned: a Select is 45 bits plus the mask, a Read
//! is 26-plus bits depending on the EBV pointer width. The encoder packs
//! fields MSB-first and reports the exact bit count so the transmit hardware
//! clocks out precisely the right number of bits. Handle fields and CRCs are
//! appended by the transmit hardware, never by the host.

use bytes::{BufMut, BytesMut};

use crate::{AuthenticateArgs, EncodeError, Gen2Command, LockArgs, MarginReadArgs, ReadArgs,
            SelectArgs, WriteArgs};

/// Largest serialized command the encoder will produce, in bytes. Sized for
/// an Authenticate carrying a maximum-length message.
pub const MAX_COMMAND_BYTES: usize = 132;

/// Maximum Authenticate message length in bits (12-bit length field, with
/// the air interface capping usable values at 1023).
pub const MAX_AUTH_MESSAGE_BITS: usize = 1023;

/// Maximum Select mask length in bits (8-bit length field).
pub const MAX_SELECT_MASK_BITS: usize = 255;

/// A serialized command: packed bytes plus the exact bit length. The final
/// byte is zero-padded below `bit_len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedGen2Command {
    /// Packed command bits, MSB-first.
    pub bytes: Vec<u8>,
    /// Number of valid bits.
    pub bit_len: usize,
}

impl EncodedGen2Command {
    /// Bytes occupied in a transmit buffer (bit length rounded up).
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Packs values MSB-first into a byte buffer.
pub struct BitWriter {
    buf: BytesMut,
    /// Bits used in the partial last byte; 0 when byte-aligned.
    bit_offset: usize,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        BitWriter {
            buf: BytesMut::with_capacity(MAX_COMMAND_BYTES),
            bit_offset: 0,
        }
    }

    /// Total bits written so far.
    pub fn bit_len(&self) -> usize {
        if self.bit_offset == 0 {
            self.buf.len() * 8
        } else {
            (self.buf.len() - 1) * 8 + self.bit_offset
        }
    }

    /// Append the low `count` bits of `value`, most significant bit first.
    /// `count` must be at most 32.
    pub fn push_bits(&mut self, value: u32, count: usize) {
        debug_assert!(count <= 32);
        for i in (0..count).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
    }

    /// Append a single bit.
    pub fn push_bit(&mut self, bit: bool) {
        if self.bit_offset == 0 {
            self.buf.put_u8(0);
        }
        if bit {
            let last = self.buf.len() - 1;
            self.buf[last] |= 0x80 >> self.bit_offset;
        }
        self.bit_offset = (self.bit_offset + 1) % 8;
    }

    /// Append the first `bit_count` bits of a MSB-first byte buffer.
    pub fn push_mask(&mut self, mask: &[u8], bit_count: usize) {
        for i in 0..bit_count {
            let byte = mask[i / 8];
            self.push_bit((byte >> (7 - i % 8)) & 1 == 1);
        }
    }

    /// Append an extensible bit vector: 8-bit blocks of 7 value bits each,
    /// with the extension bit set on every block but the last.
    pub fn push_ebv(&mut self, value: u32) {
        let mut blocks = [0u8; 5];
        let mut count = 0;
        let mut rest = value;
        loop {
            blocks[count] = (rest & 0x7F) as u8;
            count += 1;
            rest >>= 7;
            if rest == 0 {
                break;
            }
        }
        // blocks[] holds least-significant group first; emit in reverse.
        for i in (0..count).rev() {
            let extension = if i > 0 { 0x80 } else { 0x00 };
            self.push_bits((blocks[i] | extension) as u32, 8);
        }
    }

    /// Finish, returning the packed bytes and bit count.
    pub fn finish(self) -> (Vec<u8>, usize) {
        let bit_len = self.bit_len();
        (self.buf.to_vec(), bit_len)
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        BitWriter::new()
    }
}

/// Serialize a command into its air-interface bit pattern.
pub fn encode_command(command: &Gen2Command) -> Result<EncodedGen2Command, EncodeError> {
    let mut writer = BitWriter::new();
    match command {
        Gen2Command::Select(args) => encode_select(args, &mut writer)?,
        Gen2Command::Read(args) => encode_read(args, &mut writer)?,
        Gen2Command::Write(args) => encode_write(args, &mut writer),
        Gen2Command::Lock(args) => encode_lock(args, &mut writer)?,
        Gen2Command::Kill(args) => {
            writer.push_bits(0b1100_0100, 8);
            writer.push_bits(args.password as u32, 16);
            // RFU bits.
            writer.push_bits(0, 3);
        }
        Gen2Command::Authenticate(args) => encode_authenticate(args, &mut writer)?,
        Gen2Command::MarginRead(args) => encode_margin_read(args, &mut writer)?,
    }

    let (bytes, bit_len) = writer.finish();
    if bytes.len() > MAX_COMMAND_BYTES {
        return Err(EncodeError::CommandTooLong {
            bytes: bytes.len(),
            max: MAX_COMMAND_BYTES,
        });
    }
    log::trace!("encoded {} command: {} bits", command.name(), bit_len);
    Ok(EncodedGen2Command { bytes, bit_len })
}

fn check_mask(mask: &[u8], bit_length: usize) -> Result<(), EncodeError> {
    if mask.len() * 8 < bit_length {
        return Err(EncodeError::MaskLengthMismatch {
            mask_bytes: mask.len(),
            bit_length,
        });
    }
    Ok(())
}

/// Select: cmd(4) target(3) action(3) bank(2) pointer(EBV) length(8)
/// mask(length) truncate(1)
fn encode_select(args: &SelectArgs, writer: &mut BitWriter) -> Result<(), EncodeError> {
    let bit_length = args.bit_length as usize;
    check_mask(&args.mask, bit_length)?;
    writer.push_bits(0b1010, 4);
    writer.push_bits(args.target as u32, 3);
    writer.push_bits((args.action & 0x07) as u32, 3);
    writer.push_bits(args.memory_bank as u32, 2);
    writer.push_ebv(args.bit_pointer);
    writer.push_bits(bit_length as u32, 8);
    writer.push_mask(&args.mask, bit_length);
    writer.push_bit(args.truncate);
    Ok(())
}

/// Read: cmd(8) bank(2) pointer(EBV) count(8)
fn encode_read(args: &ReadArgs, writer: &mut BitWriter) -> Result<(), EncodeError> {
    if args.word_count == 0 {
        return Err(EncodeError::ZeroLengthRead);
    }
    writer.push_bits(0b1100_0010, 8);
    writer.push_bits(args.memory_bank as u32, 2);
    writer.push_ebv(args.word_pointer);
    writer.push_bits(args.word_count as u32, 8);
    Ok(())
}

/// Write: cmd(8) bank(2) pointer(EBV) data(16)
fn encode_write(args: &WriteArgs, writer: &mut BitWriter) {
    writer.push_bits(0b1100_0011, 8);
    writer.push_bits(args.memory_bank as u32, 2);
    writer.push_ebv(args.word_pointer);
    writer.push_bits(args.data as u32, 16);
}

/// Lock: cmd(8) mask(10) action(10)
fn encode_lock(args: &LockArgs, writer: &mut BitWriter) -> Result<(), EncodeError> {
    if args.mask > 0x3FF {
        return Err(EncodeError::InvalidLockPayload { value: args.mask });
    }
    if args.action > 0x3FF {
        return Err(EncodeError::InvalidLockPayload { value: args.action });
    }
    writer.push_bits(0b1100_0101, 8);
    writer.push_bits(args.mask as u32, 10);
    writer.push_bits(args.action as u32, 10);
    Ok(())
}

/// Authenticate: cmd(8) send_rep(1) inc_rep_len(1) csi(5) length(12)
/// message(length)
fn encode_authenticate(
    args: &AuthenticateArgs,
    writer: &mut BitWriter,
) -> Result<(), EncodeError> {
    let bits = args.length_bits as usize;
    if bits > MAX_AUTH_MESSAGE_BITS {
        return Err(EncodeError::MessageTooLong {
            bits,
            max: MAX_AUTH_MESSAGE_BITS,
        });
    }
    check_mask(&args.message, bits)?;
    writer.push_bits(0b1101_0101, 8);
    writer.push_bit(args.send_rep);
    writer.push_bit(args.inc_rep_len);
    writer.push_bits((args.csi & 0x1F) as u32, 5);
    writer.push_bits(bits as u32, 12);
    writer.push_mask(&args.message, bits);
    Ok(())
}

/// MarginRead: cmd(8) subcmd(8) bank(2) pointer(EBV) length(8) mask(length)
fn encode_margin_read(args: &MarginReadArgs, writer: &mut BitWriter) -> Result<(), EncodeError> {
    let bit_length = args.bit_length as usize;
    check_mask(&args.mask, bit_length)?;
    writer.push_bits(0b1110_0000, 8);
    writer.push_bits(0b0000_0011, 8);
    writer.push_bits(args.memory_bank as u32, 2);
    writer.push_ebv(args.bit_pointer);
    writer.push_bits(bit_length as u32, 8);
    writer.push_mask(&args.mask, bit_length);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KillArgs, MemoryBank, SelectTarget};

    #[test]
    fn bit_writer_packs_msb_first() {
        let mut writer = BitWriter::new();
        writer.push_bits(0b1010, 4);
        writer.push_bits(0b1, 1);
        let (bytes, bit_len) = writer.finish();
        assert_eq!(bit_len, 5);
        assert_eq!(bytes, vec![0b1010_1000]);
    }

    #[test]
    fn ebv_single_block() {
        let mut writer = BitWriter::new();
        writer.push_ebv(0x20);
        let (bytes, bit_len) = writer.finish();
        assert_eq!(bit_len, 8);
        assert_eq!(bytes, vec![0x20]);
    }

    #[test]
    fn ebv_two_blocks() {
        // 0x80 = 0b1000_0000 splits into groups 0b0000001 and 0b0000000;
        // the leading block carries the extension bit.
        let mut writer = BitWriter::new();
        writer.push_ebv(0x80);
        let (bytes, bit_len) = writer.finish();
        assert_eq!(bit_len, 16);
        assert_eq!(bytes, vec![0x81, 0x00]);
    }

    #[test]
    fn read_command_layout() {
        let cmd = Gen2Command::Read(ReadArgs {
            memory_bank: MemoryBank::User,
            word_pointer: 0,
            word_count: 4,
        });
        let encoded = encode_command(&cmd).unwrap();
        // cmd(8) + bank(2) + ebv(8) + count(8) = 26 bits
        assert_eq!(encoded.bit_len, 26);
        // 11000010 11 00000000 00000100 packed MSB-first:
        assert_eq!(encoded.bytes, vec![0xC2, 0xC0, 0x01, 0x00]);
    }

    #[test]
    fn read_rejects_zero_words() {
        let cmd = Gen2Command::Read(ReadArgs {
            memory_bank: MemoryBank::Epc,
            word_pointer: 2,
            word_count: 0,
        });
        assert_eq!(encode_command(&cmd), Err(EncodeError::ZeroLengthRead));
    }

    #[test]
    fn write_command_length() {
        let cmd = Gen2Command::Write(WriteArgs {
            memory_bank: MemoryBank::Epc,
            word_pointer: 2,
            data: 0xBEEF,
        });
        let encoded = encode_command(&cmd).unwrap();
        // cmd(8) + bank(2) + ebv(8) + data(16) = 34 bits
        assert_eq!(encoded.bit_len, 34);
    }

    #[test]
    fn select_command_length_includes_mask_and_truncate() {
        let cmd = Gen2Command::Select(SelectArgs {
            target: SelectTarget::Session2,
            action: 0,
            memory_bank: MemoryBank::Epc,
            bit_pointer: 0x20,
            bit_length: 16,
            mask: vec![0xAA, 0x55],
            truncate: false,
        });
        let encoded = encode_command(&cmd).unwrap();
        // cmd(4) + target(3) + action(3) + bank(2) + ebv(8) + len(8)
        // + mask(16) + truncate(1) = 45 bits
        assert_eq!(encoded.bit_len, 45);
    }

    #[test]
    fn select_rejects_short_mask() {
        let cmd = Gen2Command::Select(SelectArgs {
            target: SelectTarget::Sl,
            action: 4,
            memory_bank: MemoryBank::Tid,
            bit_pointer: 0,
            bit_length: 24,
            mask: vec![0xFF, 0xFF],
            truncate: false,
        });
        assert_eq!(
            encode_command(&cmd),
            Err(EncodeError::MaskLengthMismatch {
                mask_bytes: 2,
                bit_length: 24,
            })
        );
    }

    #[test]
    fn lock_command_is_28_bits() {
        let cmd = Gen2Command::Lock(LockArgs {
            mask: 0x3FF,
            action: 0x155,
        });
        let encoded = encode_command(&cmd).unwrap();
        assert_eq!(encoded.bit_len, 28);
    }

    #[test]
    fn lock_rejects_wide_fields() {
        let cmd = Gen2Command::Lock(LockArgs {
            mask: 0x400,
            action: 0,
        });
        assert_eq!(
            encode_command(&cmd),
            Err(EncodeError::InvalidLockPayload { value: 0x400 })
        );
    }

    #[test]
    fn kill_command_is_27_bits() {
        let cmd = Gen2Command::Kill(KillArgs { password: 0x1234 });
        let encoded = encode_command(&cmd).unwrap();
        assert_eq!(encoded.bit_len, 27);
        assert_eq!(encoded.bytes[0], 0xC4);
    }

    #[test]
    fn authenticate_rejects_oversized_message() {
        let cmd = Gen2Command::Authenticate(AuthenticateArgs {
            send_rep: true,
            inc_rep_len: true,
            csi: 1,
            length_bits: 1024,
            message: vec![0; 128],
        });
        assert_eq!(
            encode_command(&cmd),
            Err(EncodeError::MessageTooLong {
                bits: 1024,
                max: MAX_AUTH_MESSAGE_BITS,
            })
        );
    }

    #[test]
    fn authenticate_header_is_27_bits_plus_message() {
        let cmd = Gen2Command::Authenticate(AuthenticateArgs {
            send_rep: true,
            inc_rep_len: false,
            csi: 0,
            length_bits: 64,
            message: vec![0x11; 8],
        });
        let encoded = encode_command(&cmd).unwrap();
        assert_eq!(encoded.bit_len, 27 + 64);
    }

    #[test]
    fn margin_read_layout() {
        let cmd = Gen2Command::MarginRead(MarginReadArgs {
            memory_bank: MemoryBank::User,
            bit_pointer: 0,
            bit_length: 8,
            mask: vec![0x5A],
        });
        let encoded = encode_command(&cmd).unwrap();
        // cmd(8) + subcmd(8) + bank(2) + ebv(8) + len(8) + mask(8) = 42 bits
        assert_eq!(encoded.bit_len, 42);
        assert_eq!(encoded.bytes[0], 0xE0);
    }
}
