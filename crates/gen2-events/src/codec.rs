//! Event packet encoding and decoding.
//!
//! ## Packet Format
//!
//! | Field         | Size (bytes)   | Description                                  |
//! |---------------|----------------|----------------------------------------------|
//! | packet_type   | 1              | Type tag, see [`PacketType`].                |
//! | words         | 1              | Total packet footprint in 32-bit words.      |
//! | dyn_len       | 2 (LE)         | Dynamic payload length in bytes.             |
//! | us_counter    | 4 (LE)         | Device timestamp at capture, microseconds.   |
//! | static fields | per-type fixed | Type-specific record.                        |
//! | dynamic data  | dyn_len        | EPC bytes, reply bits, custom payloads.      |
//! | padding       | 0..=3          | Zero bytes up to the next 32-bit boundary.   |
//!
//! The header plus static record is always 32-bit aligned, so only the
//! dynamic payload ever needs padding. `words * 4` must equal the padded
//! footprint exactly; decoders reject anything else.

use crate::{
    AggregateOpSummaryFields, ContinuousInventorySummaryFields, CustomFields, DecodeError,
    EventPacket, Gen2TransactionFields, HelloWorldFields, InventoryRoundSummaryFields,
    PacketType, RampDownReason, ResultFields, StaticData, TagReadFields, TxRampDownFields,
    TxRampUpFields, PACKET_HEADER_LEN,
};

/// A read-only view over a byte buffer with a moving offset.
///
/// Decoding consumes from the front; [`ByteCursor::remaining`] reports what
/// is left, including any packets not yet parsed.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    /// Wrap a buffer, starting at offset zero.
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, offset: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Current offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Consume and return the next `n` bytes, or `None` if fewer remain.
    pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Some(slice)
    }

    /// Peek at the next `n` bytes without consuming them.
    fn peek(&self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        Some(&self.data[self.offset..self.offset + n])
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode one packet from the cursor.
///
/// On success the cursor is advanced past the packet, padding included. On
/// failure the cursor is left where it was and the caller should discard the
/// remainder of the buffer: packet boundaries cannot be recovered past a bad
/// record.
pub fn decode_packet(cursor: &mut ByteCursor<'_>) -> Result<EventPacket, DecodeError> {
    let header = cursor.peek(PACKET_HEADER_LEN).ok_or(DecodeError::TruncatedPacket {
        needed: PACKET_HEADER_LEN,
        available: cursor.remaining(),
    })?;

    let packet_type =
        PacketType::from_u8(header[0]).ok_or(DecodeError::InvalidPacketType(header[0]))?;
    let words = header[1];
    let dyn_len = u16::from_le_bytes([header[2], header[3]]) as usize;
    let us_counter = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let static_len = packet_type.static_len();
    let unpadded = PACKET_HEADER_LEN + static_len + dyn_len;
    let footprint = (unpadded + 3) & !3;
    if footprint != words as usize * 4 {
        return Err(DecodeError::LengthMismatch {
            words,
            static_len,
            dynamic_len: dyn_len,
        });
    }
    if cursor.remaining() < footprint {
        return Err(DecodeError::TruncatedPacket {
            needed: footprint,
            available: cursor.remaining(),
        });
    }

    // Padding must be zero so devices cannot smuggle data past the length
    // fields.
    let bytes = cursor.peek(footprint).ok_or(DecodeError::TruncatedPacket {
        needed: footprint,
        available: cursor.remaining(),
    })?;
    for pad in unpadded..footprint {
        if bytes[pad] != 0 {
            return Err(DecodeError::NonZeroPadding { offset: pad });
        }
    }

    // Header validated; consume the whole packet.
    let packet = cursor
        .take(footprint)
        .ok_or(DecodeError::TruncatedPacket {
            needed: footprint,
            available: cursor.remaining(),
        })?;
    let static_bytes = &packet[PACKET_HEADER_LEN..PACKET_HEADER_LEN + static_len];
    let dynamic_data =
        packet[PACKET_HEADER_LEN + static_len..PACKET_HEADER_LEN + static_len + dyn_len].to_vec();

    Ok(EventPacket {
        us_counter,
        static_data: decode_static(packet_type, static_bytes),
        dynamic_data,
    })
}

/// Decode the type-specific static record. `bytes` is exactly
/// `packet_type.static_len()` long; the caller guarantees it.
fn decode_static(packet_type: PacketType, bytes: &[u8]) -> StaticData {
    match packet_type {
        PacketType::TxRampUp => StaticData::TxRampUp(TxRampUpFields {
            carrier_khz: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }),
        PacketType::TxRampDown => StaticData::TxRampDown(TxRampDownFields {
            reason: RampDownReason::from_u8(bytes[0]),
        }),
        PacketType::InventoryRoundSummary => {
            StaticData::InventoryRoundSummary(InventoryRoundSummaryFields {
                duration_us: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                total_slots: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
                num_slots: u16::from_le_bytes([bytes[8], bytes[9]]),
                num_tags: u16::from_le_bytes([bytes[10], bytes[11]]),
                reason: bytes[12],
                final_q: bytes[13],
                min_q_count: bytes[14],
                queries_since_valid_epc_count: bytes[15],
            })
        }
        PacketType::TagRead => StaticData::TagRead(TagReadFields {
            rssi: u16::from_le_bytes([bytes[0], bytes[1]]),
            rf_phase_begin: u16::from_le_bytes([bytes[2], bytes[3]]),
            rf_phase_end: u16::from_le_bytes([bytes[4], bytes[5]]),
            rx_gain_settings: bytes[6],
            read_type: bytes[7],
            tid_offset: u16::from_le_bytes([bytes[8], bytes[9]]),
            halted_on_tag: bytes[10] != 0,
        }),
        PacketType::Gen2Transaction => StaticData::Gen2Transaction(Gen2TransactionFields {
            transaction_id: bytes[0],
            status: bytes[1],
            num_bits: u16::from_le_bytes([bytes[2], bytes[3]]),
        }),
        PacketType::HelloWorld => StaticData::HelloWorld(HelloWorldFields {
            sku: u16::from_le_bytes([bytes[0], bytes[1]]),
            reset_reason: bytes[2],
            crash_flag: bytes[3] != 0,
        }),
        PacketType::Custom => StaticData::Custom(CustomFields {
            payload_len: u16::from_le_bytes([bytes[0], bytes[1]]),
        }),
        PacketType::AggregateOpSummary => {
            StaticData::AggregateOpSummary(AggregateOpSummaryFields {
                op_run_count: u16::from_le_bytes([bytes[0], bytes[1]]),
                write_count: u16::from_le_bytes([bytes[2], bytes[3]]),
                final_op_id: bytes[4],
                final_op_error: bytes[5],
                identifier: u16::from_le_bytes([bytes[6], bytes[7]]),
            })
        }
        PacketType::ContinuousInventorySummary => {
            StaticData::ContinuousInventorySummary(ContinuousInventorySummaryFields {
                duration_us: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                number_of_inventory_rounds: u32::from_le_bytes([
                    bytes[4], bytes[5], bytes[6], bytes[7],
                ]),
                number_of_tags: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
                reason: bytes[12],
                last_op_id: bytes[13],
                last_op_error: bytes[14],
            })
        }
        PacketType::Result => StaticData::Result(ResultFields {
            module: bytes[0],
            result_code: bytes[1],
            op_id: bytes[2],
            op_error: bytes[3],
        }),
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode a packet, appending to `out`. Pads with zeros to a 32-bit boundary.
pub fn encode_packet(packet: &EventPacket, out: &mut Vec<u8>) {
    let packet_type = packet.packet_type();
    let static_len = packet_type.static_len();
    let dyn_len = packet.dynamic_data.len();
    let unpadded = PACKET_HEADER_LEN + static_len + dyn_len;
    let footprint = (unpadded + 3) & !3;

    out.reserve(footprint);
    out.push(packet_type as u8);
    out.push((footprint / 4) as u8);
    out.extend_from_slice(&(dyn_len as u16).to_le_bytes());
    out.extend_from_slice(&packet.us_counter.to_le_bytes());
    encode_static(&packet.static_data, out);
    out.extend_from_slice(&packet.dynamic_data);
    for _ in unpadded..footprint {
        out.push(0);
    }
}

fn encode_static(static_data: &StaticData, out: &mut Vec<u8>) {
    match static_data {
        StaticData::TxRampUp(f) => {
            out.extend_from_slice(&f.carrier_khz.to_le_bytes());
        }
        StaticData::TxRampDown(f) => {
            out.push(f.reason as u8);
            out.extend_from_slice(&[0; 3]);
        }
        StaticData::InventoryRoundSummary(f) => {
            out.extend_from_slice(&f.duration_us.to_le_bytes());
            out.extend_from_slice(&f.total_slots.to_le_bytes());
            out.extend_from_slice(&f.num_slots.to_le_bytes());
            out.extend_from_slice(&f.num_tags.to_le_bytes());
            out.push(f.reason);
            out.push(f.final_q);
            out.push(f.min_q_count);
            out.push(f.queries_since_valid_epc_count);
        }
        StaticData::TagRead(f) => {
            out.extend_from_slice(&f.rssi.to_le_bytes());
            out.extend_from_slice(&f.rf_phase_begin.to_le_bytes());
            out.extend_from_slice(&f.rf_phase_end.to_le_bytes());
            out.push(f.rx_gain_settings);
            out.push(f.read_type);
            out.extend_from_slice(&f.tid_offset.to_le_bytes());
            out.push(f.halted_on_tag as u8);
            out.push(0);
        }
        StaticData::Gen2Transaction(f) => {
            out.push(f.transaction_id);
            out.push(f.status);
            out.extend_from_slice(&f.num_bits.to_le_bytes());
        }
        StaticData::HelloWorld(f) => {
            out.extend_from_slice(&f.sku.to_le_bytes());
            out.push(f.reset_reason);
            out.push(f.crash_flag as u8);
        }
        StaticData::Custom(f) => {
            out.extend_from_slice(&f.payload_len.to_le_bytes());
            out.extend_from_slice(&[0; 2]);
        }
        StaticData::AggregateOpSummary(f) => {
            out.extend_from_slice(&f.op_run_count.to_le_bytes());
            out.extend_from_slice(&f.write_count.to_le_bytes());
            out.push(f.final_op_id);
            out.push(f.final_op_error);
            out.extend_from_slice(&f.identifier.to_le_bytes());
        }
        StaticData::ContinuousInventorySummary(f) => {
            out.extend_from_slice(&f.duration_us.to_le_bytes());
            out.extend_from_slice(&f.number_of_inventory_rounds.to_le_bytes());
            out.extend_from_slice(&f.number_of_tags.to_le_bytes());
            out.push(f.reason);
            out.push(f.last_op_id);
            out.push(f.last_op_error);
            out.push(0);
        }
        StaticData::Result(f) => {
            out.push(f.module);
            out.push(f.result_code);
            out.push(f.op_id);
            out.push(f.op_error);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
