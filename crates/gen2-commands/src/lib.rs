//! Gen2 air-interface command descriptors and bit-level encoder.
//!
//! Access commands (Read, Write, Lock, Kill, Authenticate, MarginRead) and
//! Select are described by plain argument structs and serialized to their
//! bit-exact air format by [`encode_command`]. The encoder produces the
//! command bits only; handles and CRCs are appended by the transmit
//! hardware.

mod args;
mod encode;
mod error;

pub use args::{
    AuthenticateArgs, Gen2Command, KillArgs, LockArgs, MarginReadArgs, MemoryBank, ReadArgs,
    SelectArgs, SelectTarget, WriteArgs,
};
pub use encode::{
    encode_command, BitWriter, EncodedGen2Command, MAX_AUTH_MESSAGE_BITS, MAX_COMMAND_BYTES,
    MAX_SELECT_MASK_BITS,
};
pub use error::EncodeError;
