//! Gen2 command buffer management.
//!
//! The device holds a fixed number of pre-encoded command slots plus three
//! enable bitmaps choosing which slots fire in each context (halted on a
//! tag, automatically at each tag, or as Selects before a round).
//! [`Gen2CommandBuffer`] keeps the authoritative host-side mirror: commands
//! are encoded and appended locally, then pushed to the device in one write.

use thiserror::Error;
use tracing::debug;

use gen2_commands::{encode_command, EncodeError, EncodedGen2Command, Gen2Command};

use crate::device::{DeviceError, DeviceOps, EnableKind};

/// Number of command slots on the device.
pub const MAX_TX_COMMAND_COUNT: usize = 10;

/// Shared transmit buffer capacity across all slots, in bytes.
pub const TX_BUFFER_BYTES: usize = 128;

/// Errors raised by the command buffer manager.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Gen2BufferError {
    /// The command failed to encode.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// All command slots are in use, or the shared buffer is out of bytes.
    #[error("command buffer full")]
    BufferFull,

    /// A device write was requested with no commands appended.
    #[error("no commands in local sequence")]
    EmptySequence,

    /// An enable bitmap names a slot with no command in it.
    #[error("enable set names empty slot {slot}")]
    EnabledEmptySlot {
        /// The offending slot index.
        slot: usize,
    },

    /// The device rejected the write.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// One occupied command slot.
#[derive(Debug, Clone)]
struct BufferedCommand {
    command: Gen2Command,
    encoded: EncodedGen2Command,
    transaction_id: u8,
}

/// Host-side mirror of the device command slots.
#[derive(Debug, Default)]
pub struct Gen2CommandBuffer {
    slots: Vec<BufferedCommand>,
    used_bytes: usize,
}

impl Gen2CommandBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        Gen2CommandBuffer::default()
    }

    /// Discard the local sequence. The device copy is untouched until the
    /// next [`Gen2CommandBuffer::write_sequence`].
    pub fn clear_local_sequence(&mut self) {
        self.slots.clear();
        self.used_bytes = 0;
    }

    /// Encode a command and append it to the next free slot, returning the
    /// slot index. Indices are dense, starting at 0 after each clear.
    pub fn encode_and_append_command(
        &mut self,
        command: &Gen2Command,
        transaction_id: u8,
    ) -> Result<usize, Gen2BufferError> {
        if self.slots.len() >= MAX_TX_COMMAND_COUNT {
            return Err(Gen2BufferError::BufferFull);
        }
        let encoded = encode_command(command)?;
        if self.used_bytes + encoded.byte_len() > TX_BUFFER_BYTES {
            return Err(Gen2BufferError::BufferFull);
        }

        let index = self.slots.len();
        self.used_bytes += encoded.byte_len();
        debug!(
            slot = index,
            bits = encoded.bit_len,
            "appended {} command",
            command.name()
        );
        self.slots.push(BufferedCommand {
            command: command.clone(),
            encoded,
            transaction_id,
        });
        Ok(index)
    }

    /// Push the local sequence to the device.
    pub fn write_sequence<D: DeviceOps>(&self, device: &mut D) -> Result<(), Gen2BufferError> {
        if self.slots.is_empty() {
            return Err(Gen2BufferError::EmptySequence);
        }
        let encoded: Vec<EncodedGen2Command> =
            self.slots.iter().map(|slot| slot.encoded.clone()).collect();
        device.write_gen2_sequence(&encoded)?;
        Ok(())
    }

    /// Program the halted-on-tag enable bitmap. Returns the number of
    /// enabled slots.
    pub fn write_halted_enables<D: DeviceOps>(
        &self,
        enables: &[bool],
        device: &mut D,
    ) -> Result<usize, Gen2BufferError> {
        self.write_enables(EnableKind::Halted, enables, device)
    }

    /// Program the auto-access enable bitmap. Returns the number of enabled
    /// slots.
    pub fn write_auto_access_enables<D: DeviceOps>(
        &self,
        enables: &[bool],
        device: &mut D,
    ) -> Result<usize, Gen2BufferError> {
        self.write_enables(EnableKind::AutoAccess, enables, device)
    }

    /// Program the pre-round Select enable bitmap. Returns the number of
    /// enabled slots.
    pub fn write_select_enables<D: DeviceOps>(
        &self,
        enables: &[bool],
        device: &mut D,
    ) -> Result<usize, Gen2BufferError> {
        self.write_enables(EnableKind::Select, enables, device)
    }

    fn write_enables<D: DeviceOps>(
        &self,
        kind: EnableKind,
        enables: &[bool],
        device: &mut D,
    ) -> Result<usize, Gen2BufferError> {
        for (slot, enabled) in enables.iter().enumerate() {
            if *enabled && slot >= self.slots.len() {
                return Err(Gen2BufferError::EnabledEmptySlot { slot });
            }
        }
        device.write_gen2_enables(kind, enables)?;
        Ok(enables.iter().filter(|enabled| **enabled).count())
    }

    /// The command in a slot, if occupied.
    pub fn command_at(&self, index: usize) -> Option<&Gen2Command> {
        self.slots.get(index).map(|slot| &slot.command)
    }

    /// The transaction id recorded for a slot.
    pub fn transaction_id_at(&self, index: usize) -> Option<u8> {
        self.slots.get(index).map(|slot| slot.transaction_id)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no commands are appended.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
