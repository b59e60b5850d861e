//! Device operation boundary.
//!
//! Everything below this trait is transport and register work; everything
//! above it is session logic. The engine only ever talks to the chip through
//! [`DeviceOps`], so tests drive it with a scripted implementation and
//! production wires in the real transport.

use thiserror::Error;

use gen2_commands::EncodedGen2Command;

use crate::config::{CarrierConfig, InventoryRoundConfig, InventoryRoundConfig2, RfMode};

/// Which ops the device can report a failure against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpId {
    /// No op associated with the error.
    None = 0,
    /// Carrier ramp-up op.
    TxRampUp = 1,
    /// Carrier ramp-down op.
    TxRampDown = 2,
    /// Select transmission op.
    SendSelect = 3,
    /// Inventory round op.
    StartInventoryRound = 4,
    /// RF mode programming op.
    SetRfMode = 5,
    /// Gen2 sequence write op.
    WriteGen2Sequence = 6,
}

/// Op-level error codes reported by firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpError {
    /// No error.
    None = 0,
    /// The op was issued while the transmitter was in the wrong state.
    InvalidTxState = 1,
    /// The op did not finish in time.
    Timeout = 2,
    /// An internal buffer overflowed.
    Overflow = 3,
    /// The op arguments were rejected.
    InvalidParams = 4,
}

/// How a device call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    /// The chip never answered the command.
    CommandNoResponse,
    /// The chip answered the command with an error response.
    CommandWithResponse,
    /// The op ran and reported an error.
    Op,
    /// The op never reported completion.
    OpTimeout,
}

/// A failure at the device boundary, with enough detail to embed in the
/// session summary.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("device error: {kind:?} (op {op_id:?}, error {op_error:?})")]
pub struct DeviceError {
    /// Failure category.
    pub kind: DeviceErrorKind,
    /// Op the failure is attributed to.
    pub op_id: OpId,
    /// Op-level error code, when the op ran.
    pub op_error: OpError,
}

impl DeviceError {
    /// An op-level failure.
    pub fn op(op_id: OpId, op_error: OpError) -> Self {
        DeviceError {
            kind: DeviceErrorKind::Op,
            op_id,
            op_error,
        }
    }

    /// An op that never reported completion.
    pub fn op_timeout(op_id: OpId) -> Self {
        DeviceError {
            kind: DeviceErrorKind::OpTimeout,
            op_id,
            op_error: OpError::Timeout,
        }
    }

    /// Whether this is the transmit-state race on a Select op: the carrier
    /// dropped between ramp-up and the Select reaching the radio.
    pub fn is_select_tx_race(&self) -> bool {
        self.op_id == OpId::SendSelect && self.op_error == OpError::InvalidTxState
    }
}

/// Which enable bitmap a write targets. The three bitmaps are independent
/// registers on the device; writing one never touches the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableKind {
    /// Commands transmitted while halted on a tag.
    Halted,
    /// Commands transmitted automatically at each singulated tag.
    AutoAccess,
    /// Select commands transmitted before a round.
    Select,
}

/// Operations the session layer needs from the device.
pub trait DeviceOps {
    /// Current device time in microseconds. Wraps at `u32::MAX`.
    fn device_time_us(&self) -> u32;

    /// Whether the carrier is currently ramped up.
    fn cw_is_on(&self) -> bool;

    /// Program the modulation/backscatter mode.
    fn set_rf_mode(&mut self, mode: RfMode) -> Result<(), DeviceError>;

    /// Ramp the carrier onto a channel with regulatory dwell budgets.
    fn ramp_carrier_on(&mut self, config: &CarrierConfig) -> Result<(), DeviceError>;

    /// Ramp the carrier down.
    fn ramp_carrier_off(&mut self) -> Result<(), DeviceError>;

    /// Kick off one inventory round, optionally preceded by the buffered
    /// Select sequence.
    fn start_inventory_round(
        &mut self,
        config: &InventoryRoundConfig,
        config_2: &InventoryRoundConfig2,
        send_selects: bool,
    ) -> Result<(), DeviceError>;

    /// Block until the currently running op reports completion.
    fn wait_op_completion(&mut self) -> Result<(), DeviceError>;

    /// Push an encoded command sequence into the device transmit buffer.
    fn write_gen2_sequence(&mut self, commands: &[EncodedGen2Command])
        -> Result<(), DeviceError>;

    /// Program one of the three enable bitmaps.
    fn write_gen2_enables(&mut self, kind: EnableKind, enables: &[bool])
        -> Result<(), DeviceError>;
}
