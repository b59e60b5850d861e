//! Event packet types and codec for the Gen2 reader event stream.
//!
//! The reader chip reports everything it does (carrier ramps, tag reads,
//! round summaries, command replies) as a stream of length-prefixed event
//! packets. This crate owns the packet data model and the wire codec; it
//! performs no I/O and holds no session state.

mod codec;
mod error;
mod types;

pub use codec::{decode_packet, encode_packet, ByteCursor};
pub use error::DecodeError;
pub use types::{
    AggregateOpSummaryFields, ContinuousInventorySummaryFields, CustomFields, EventPacket,
    Gen2TransactionFields, HelloWorldFields, InventoryRoundSummaryFields, PacketType,
    RampDownReason, ResultFields, StaticData, StopReason, SummaryReason, TagReadFields,
    TxRampDownFields, TxRampUpFields, PACKET_HEADER_LEN,
};
