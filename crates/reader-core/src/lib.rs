//! Session logic for a Gen2 RFID reader.
//!
//! The crate sits between a byte transport feeding device event streams and
//! the application consuming tag reads: it runs continuous inventory
//! sessions ([`ContinuousInventoryEngine`]), keeps regulatory dwell
//! bookkeeping ([`ActiveRegion`]), buffers Gen2 access commands
//! ([`Gen2CommandBuffer`]) and queues decoded events to the caller
//! ([`event_queue`]). [`ReaderService`] wraps the engine in a delivery
//! thread for callers that want a synchronous API.

pub mod config;
pub mod device;
mod error;
pub mod gen2_buffer;
pub mod mock;
pub mod queue;
pub mod region;
pub mod regulatory;
pub mod service;

mod inventory;

pub use config::{
    CarrierConfig, InventoryRoundConfig, InventoryRoundConfig2, RfMode, SessionParams,
    StopConditions, Target,
};
pub use device::{DeviceError, DeviceErrorKind, DeviceOps, EnableKind, OpError, OpId};
pub use error::ReaderError;
pub use gen2_buffer::{Gen2BufferError, Gen2CommandBuffer, MAX_TX_COMMAND_COUNT, TX_BUFFER_BYTES};
pub use inventory::{ContinuousInventoryEngine, ContinuousInventoryState, InventoryPhase};
pub use queue::{event_queue, PacketReceiver, PacketSender, QueueFull};
pub use region::{BudgetPolicy, ChannelPlan, Region, RegionId, RegulatoryTimers};
pub use regulatory::{ActiveRegion, ChannelTracker};
pub use service::{ReaderHandle, ReaderService};
