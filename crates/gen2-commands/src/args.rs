//! Gen2 command descriptors.
//!
//! Each air-interface command the reader can transmit at a halted tag (or
//! before a round, in the case of Select) is described by one argument
//! struct. The structs carry host-side values; the bit-exact air format is
//! produced by [`encode_command`](crate::encode_command).

/// Tag memory banks addressable by access commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MemoryBank {
    /// Kill and access passwords.
    Reserved = 0,
    /// StoredCRC, PC and the EPC itself.
    Epc = 1,
    /// Tag identification memory.
    Tid = 2,
    /// Optional user memory.
    User = 3,
}

/// Which session flag (or the SL flag) a Select command modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SelectTarget {
    /// Session 0 inventoried flag.
    Session0 = 0,
    /// Session 1 inventoried flag.
    Session1 = 1,
    /// Session 2 inventoried flag.
    Session2 = 2,
    /// Session 3 inventoried flag.
    Session3 = 3,
    /// The SL flag.
    Sl = 4,
}

/// Arguments for a Select command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectArgs {
    /// Flag the command asserts or deasserts.
    pub target: SelectTarget,
    /// Matching/non-matching action code, 0..=7.
    pub action: u8,
    /// Memory bank the mask is compared against.
    pub memory_bank: MemoryBank,
    /// Starting bit address of the comparison.
    pub bit_pointer: u32,
    /// Number of mask bits to compare.
    pub bit_length: u8,
    /// Mask bits, MSB-first, at least `bit_length` bits long.
    pub mask: Vec<u8>,
    /// Truncate tag replies to the portion following the mask.
    pub truncate: bool,
}

/// Arguments for a Read command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadArgs {
    /// Bank to read from.
    pub memory_bank: MemoryBank,
    /// Starting word address.
    pub word_pointer: u32,
    /// Number of 16-bit words to read. Must be non-zero.
    pub word_count: u8,
}

/// Arguments for a Write command. Tag writes are one 16-bit word at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteArgs {
    /// Bank to write into.
    pub memory_bank: MemoryBank,
    /// Word address to write.
    pub word_pointer: u32,
    /// The word to store.
    pub data: u16,
}

/// Arguments for a Lock command. Mask and action are each 10 bits covering
/// the kill password, access password, EPC, TID and user banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockArgs {
    /// Which lock bits the command touches.
    pub mask: u16,
    /// New values for the touched bits.
    pub action: u16,
}

/// Arguments for one half of a Kill command exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillArgs {
    /// Half of the 32-bit kill password, EBV'd against the tag handle.
    pub password: u16,
}

/// Arguments for an Authenticate command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticateArgs {
    /// Ask the tag to send its response rather than store it.
    pub send_rep: bool,
    /// Ask the tag to include a length field in its response.
    pub inc_rep_len: bool,
    /// Crypto suite indicator, 0..=31.
    pub csi: u8,
    /// Length of `message` in bits, at most 1023.
    pub length_bits: u16,
    /// Challenge bits, MSB-first.
    pub message: Vec<u8>,
}

/// Arguments for the proprietary margin-read diagnostic command. Verifies
/// that the addressed bits are stored with full margin rather than merely
/// readable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarginReadArgs {
    /// Bank to verify.
    pub memory_bank: MemoryBank,
    /// Starting bit address.
    pub bit_pointer: u32,
    /// Number of bits to verify.
    pub bit_length: u8,
    /// Expected bit values, MSB-first.
    pub mask: Vec<u8>,
}

/// One transmittable Gen2 command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gen2Command {
    /// See [`SelectArgs`].
    Select(SelectArgs),
    /// See [`ReadArgs`].
    Read(ReadArgs),
    /// See [`WriteArgs`].
    Write(WriteArgs),
    /// See [`LockArgs`].
    Lock(LockArgs),
    /// See [`KillArgs`].
    Kill(KillArgs),
    /// See [`AuthenticateArgs`].
    Authenticate(AuthenticateArgs),
    /// See [`MarginReadArgs`].
    MarginRead(MarginReadArgs),
}

impl Gen2Command {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Gen2Command::Select(_) => "Select",
            Gen2Command::Read(_) => "Read",
            Gen2Command::Write(_) => "Write",
            Gen2Command::Lock(_) => "Lock",
            Gen2Command::Kill(_) => "Kill",
            Gen2Command::Authenticate(_) => "Authenticate",
            Gen2Command::MarginRead(_) => "MarginRead",
        }
    }

    /// Whether this command is transmitted before a round rather than at a
    /// halted tag.
    pub fn is_select(&self) -> bool {
        matches!(self, Gen2Command::Select(_))
    }
}
