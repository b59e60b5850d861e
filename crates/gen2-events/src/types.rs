//! Event packet data model.
//!
//! Every record the reader chip emits on its event stream is decoded into an
//! [`EventPacket`]: a type tag, a microsecond capture timestamp, a fixed-size
//! static record and a variable-length dynamic payload. The static records
//! are modelled as the [`StaticData`] enum so a packet can never be read
//! through the wrong variant.

/// Number of bytes in the common packet header
/// (type + words + dynamic length + timestamp).
pub const PACKET_HEADER_LEN: usize = 8;

/// Known event packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// Transmitter carrier ramped up.
    TxRampUp = 0x01,
    /// Transmitter carrier ramped down.
    TxRampDown = 0x02,
    /// One inventory round finished (or was interrupted).
    InventoryRoundSummary = 0x03,
    /// A tag was singulated and its EPC captured.
    TagRead = 0x04,
    /// Reply to a buffered Gen2 access command.
    Gen2Transaction = 0x05,
    /// First packet emitted after boot.
    HelloWorld = 0x06,
    /// Application-defined payload inserted by the host.
    Custom = 0x07,
    /// Summary of an aggregate op sequence.
    AggregateOpSummary = 0x08,
    /// Host-synthesized end-of-session report.
    ContinuousInventorySummary = 0x09,
    /// Host-synthesized error report.
    Result = 0x0A,
}

impl PacketType {
    /// Decode a raw type tag. Returns `None` for unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(PacketType::TxRampUp),
            0x02 => Some(PacketType::TxRampDown),
            0x03 => Some(PacketType::InventoryRoundSummary),
            0x04 => Some(PacketType::TagRead),
            0x05 => Some(PacketType::Gen2Transaction),
            0x06 => Some(PacketType::HelloWorld),
            0x07 => Some(PacketType::Custom),
            0x08 => Some(PacketType::AggregateOpSummary),
            0x09 => Some(PacketType::ContinuousInventorySummary),
            0x0A => Some(PacketType::Result),
            _ => None,
        }
    }

    /// Length in bytes of the static field record for this type.
    ///
    /// Every static record is a multiple of 4 bytes, so the dynamic payload
    /// always starts 32-bit aligned, exactly `static_len` past the record.
    pub fn static_len(self) -> usize {
        match self {
            PacketType::TxRampUp => 4,
            PacketType::TxRampDown => 4,
            PacketType::InventoryRoundSummary => 16,
            PacketType::TagRead => 12,
            PacketType::Gen2Transaction => 4,
            PacketType::HelloWorld => 4,
            PacketType::Custom => 4,
            PacketType::AggregateOpSummary => 8,
            PacketType::ContinuousInventorySummary => 16,
            PacketType::Result => 4,
        }
    }
}

/// Why an inventory round ended, as reported in the round summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SummaryReason {
    /// Reserved zero value; never valid on the wire.
    None = 0,
    /// The round ran to completion (all slots exhausted).
    Done = 1,
    /// The host requested a stop.
    Host = 2,
    /// The regulatory timer expired and squelched the transmitter.
    Regulatory = 3,
    /// The device event FIFO overflowed.
    EventFifoFull = 4,
    /// A round was commanded while the carrier was not ramped.
    TxNotRampedUp = 5,
    /// The round configuration was rejected by firmware.
    InvalidParam = 6,
    /// Tag responses exceeded the LMAC processing capacity.
    LmacOverload = 7,
    /// The firmware does not support the requested round.
    Unsupported = 8,
}

impl SummaryReason {
    /// Decode a raw reason byte. Returns `None` for unknown values
    /// (including the reserved zero), which the session layer treats as a
    /// protocol error.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(SummaryReason::Done),
            2 => Some(SummaryReason::Host),
            3 => Some(SummaryReason::Regulatory),
            4 => Some(SummaryReason::EventFifoFull),
            5 => Some(SummaryReason::TxNotRampedUp),
            6 => Some(SummaryReason::InvalidParam),
            7 => Some(SummaryReason::LmacOverload),
            8 => Some(SummaryReason::Unsupported),
            _ => None,
        }
    }
}

/// Why a continuous inventory session ended, as reported in the
/// [`ContinuousInventorySummary`] packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StopReason {
    /// Session still running (or never started).
    None = 0,
    /// The host called stop.
    Host = 1,
    /// The configured round limit was reached.
    MaxNumberOfRounds = 2,
    /// The configured tag limit was reached.
    MaxNumberOfTags = 3,
    /// The configured duration limit was reached.
    MaxDuration = 4,
    /// A device op failed.
    OpError = 5,
    /// A device op timed out.
    SdkTimeoutError = 6,
    /// A device command was rejected.
    DeviceCommandError = 7,
    /// The device event FIFO overflowed.
    EventFifoFull = 8,
    /// The round configuration was rejected.
    InvalidParam = 9,
    /// Tag responses overloaded the LMAC.
    LmacOverload = 10,
    /// A round summary carried an unknown reason byte.
    SummaryReasonInvalid = 11,
    /// Catch-all for values produced by newer firmware.
    Unknown = 12,
}

impl StopReason {
    /// Decode a raw stop reason byte.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => StopReason::None,
            1 => StopReason::Host,
            2 => StopReason::MaxNumberOfRounds,
            3 => StopReason::MaxNumberOfTags,
            4 => StopReason::MaxDuration,
            5 => StopReason::OpError,
            6 => StopReason::SdkTimeoutError,
            7 => StopReason::DeviceCommandError,
            8 => StopReason::EventFifoFull,
            9 => StopReason::InvalidParam,
            10 => StopReason::LmacOverload,
            11 => StopReason::SummaryReasonInvalid,
            _ => StopReason::Unknown,
        }
    }
}

/// Why the carrier ramped down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RampDownReason {
    /// The host commanded the ramp down.
    Host = 0,
    /// The regulatory dwell timer expired.
    Regulatory = 1,
}

impl RampDownReason {
    /// Decode a raw reason byte; unknown values fall back to `Host`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => RampDownReason::Regulatory,
            _ => RampDownReason::Host,
        }
    }
}

/// Static fields of a `TagRead` packet. The EPC (and optional TID) bytes
/// travel in the dynamic payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagReadFields {
    /// Raw RSSI at singulation.
    pub rssi: u16,
    /// RF phase at the start of the tag reply.
    pub rf_phase_begin: u16,
    /// RF phase at the end of the tag reply.
    pub rf_phase_end: u16,
    /// Receiver gain settings in effect for this read.
    pub rx_gain_settings: u8,
    /// Raw tag-read type (EPC only, EPC+PC, EPC+TID, ...).
    pub read_type: u8,
    /// Offset of the TID within the dynamic payload; zero when absent.
    pub tid_offset: u16,
    /// Whether the LMAC halted on this tag awaiting host access commands.
    pub halted_on_tag: bool,
}

/// Static fields of an `InventoryRoundSummary` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InventoryRoundSummaryFields {
    /// Round duration in microseconds.
    pub duration_us: u32,
    /// Total number of slots run, across Q adjustments.
    pub total_slots: u32,
    /// Number of slots in the final Q.
    pub num_slots: u16,
    /// Tags singulated this round.
    pub num_tags: u16,
    /// Raw completion reason byte (see [`SummaryReason`]).
    pub reason: u8,
    /// Q value when the round ended.
    pub final_q: u8,
    /// Carried Q-algorithm state: rounds spent at minimum Q.
    pub min_q_count: u8,
    /// Carried Q-algorithm state: queries since the last valid EPC.
    pub queries_since_valid_epc_count: u8,
}

/// Static fields of a `Gen2Transaction` packet. The tag reply bits travel in
/// the dynamic payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gen2TransactionFields {
    /// Transaction id supplied when the command was buffered.
    pub transaction_id: u8,
    /// Raw transaction status.
    pub status: u8,
    /// Number of valid reply bits in the dynamic payload.
    pub num_bits: u16,
}

/// Static fields of a `TxRampUp` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxRampUpFields {
    /// Carrier frequency that ramped up, in kHz.
    pub carrier_khz: u32,
}

/// Static fields of a `TxRampDown` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxRampDownFields {
    /// Why the carrier dropped.
    pub reason: RampDownReason,
}

/// Static fields of a `HelloWorld` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HelloWorldFields {
    /// Chip stock-keeping unit identifier.
    pub sku: u16,
    /// Raw reset reason reported by firmware.
    pub reset_reason: u8,
    /// Set when the previous run ended in a crash.
    pub crash_flag: bool,
}

/// Static fields of a `Custom` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CustomFields {
    /// Length in bytes of the application payload in the dynamic data.
    pub payload_len: u16,
}

/// Static fields of an `AggregateOpSummary` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AggregateOpSummaryFields {
    /// Number of ops executed by the aggregate sequence.
    pub op_run_count: u16,
    /// Number of register writes executed.
    pub write_count: u16,
    /// Op id of the last instruction executed.
    pub final_op_id: u8,
    /// Error code of the last instruction executed.
    pub final_op_error: u8,
    /// Caller-supplied sequence identifier.
    pub identifier: u16,
}

/// Static fields of a `ContinuousInventorySummary` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContinuousInventorySummaryFields {
    /// Session duration in microseconds.
    pub duration_us: u32,
    /// Completed inventory rounds.
    pub number_of_inventory_rounds: u32,
    /// Tags singulated over the whole session.
    pub number_of_tags: u32,
    /// Raw stop reason byte (see [`StopReason`]).
    pub reason: u8,
    /// Op id of the failing op, when the session ended on a device error.
    pub last_op_id: u8,
    /// Op error code of the failing op.
    pub last_op_error: u8,
}

/// Static fields of a host-synthesized `Result` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultFields {
    /// Module that raised the error.
    pub module: u8,
    /// Module-specific result code.
    pub result_code: u8,
    /// Op id associated with the failure, when applicable.
    pub op_id: u8,
    /// Op error code associated with the failure, when applicable.
    pub op_error: u8,
}

/// Type-specific static record of an event packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticData {
    /// See [`TxRampUpFields`].
    TxRampUp(TxRampUpFields),
    /// See [`TxRampDownFields`].
    TxRampDown(TxRampDownFields),
    /// See [`InventoryRoundSummaryFields`].
    InventoryRoundSummary(InventoryRoundSummaryFields),
    /// See [`TagReadFields`].
    TagRead(TagReadFields),
    /// See [`Gen2TransactionFields`].
    Gen2Transaction(Gen2TransactionFields),
    /// See [`HelloWorldFields`].
    HelloWorld(HelloWorldFields),
    /// See [`CustomFields`].
    Custom(CustomFields),
    /// See [`AggregateOpSummaryFields`].
    AggregateOpSummary(AggregateOpSummaryFields),
    /// See [`ContinuousInventorySummaryFields`].
    ContinuousInventorySummary(ContinuousInventorySummaryFields),
    /// See [`ResultFields`].
    Result(ResultFields),
}

impl StaticData {
    /// The packet type this record belongs to.
    pub fn packet_type(&self) -> PacketType {
        match self {
            StaticData::TxRampUp(_) => PacketType::TxRampUp,
            StaticData::TxRampDown(_) => PacketType::TxRampDown,
            StaticData::InventoryRoundSummary(_) => PacketType::InventoryRoundSummary,
            StaticData::TagRead(_) => PacketType::TagRead,
            StaticData::Gen2Transaction(_) => PacketType::Gen2Transaction,
            StaticData::HelloWorld(_) => PacketType::HelloWorld,
            StaticData::Custom(_) => PacketType::Custom,
            StaticData::AggregateOpSummary(_) => PacketType::AggregateOpSummary,
            StaticData::ContinuousInventorySummary(_) => {
                PacketType::ContinuousInventorySummary
            }
            StaticData::Result(_) => PacketType::Result,
        }
    }
}

/// One decoded unit from the device event stream.
///
/// Immutable once constructed. Packets are either decoded from a byte buffer
/// by [`decode_packet`](crate::decode_packet) or synthesized by the host
/// (summary and result packets).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPacket {
    /// Monotonic device-time counter at capture, in microseconds.
    pub us_counter: u32,
    /// Type-specific fixed-size record.
    pub static_data: StaticData,
    /// Variable-length payload (EPC bytes, reply bits, ...). May be empty.
    pub dynamic_data: Vec<u8>,
}

impl EventPacket {
    /// The packet's type tag.
    pub fn packet_type(&self) -> PacketType {
        self.static_data.packet_type()
    }

    /// Build a tag-read packet carrying `epc` as its dynamic payload.
    pub fn tag_read(us_counter: u32, fields: TagReadFields, epc: Vec<u8>) -> Self {
        EventPacket {
            us_counter,
            static_data: StaticData::TagRead(fields),
            dynamic_data: epc,
        }
    }

    /// Build an inventory round summary packet.
    pub fn round_summary(us_counter: u32, fields: InventoryRoundSummaryFields) -> Self {
        EventPacket {
            us_counter,
            static_data: StaticData::InventoryRoundSummary(fields),
            dynamic_data: Vec::new(),
        }
    }

    /// Build a continuous inventory summary packet.
    pub fn continuous_summary(
        us_counter: u32,
        fields: ContinuousInventorySummaryFields,
    ) -> Self {
        EventPacket {
            us_counter,
            static_data: StaticData::ContinuousInventorySummary(fields),
            dynamic_data: Vec::new(),
        }
    }

    /// Build a host error-report packet.
    pub fn result(us_counter: u32, fields: ResultFields) -> Self {
        EventPacket {
            us_counter,
            static_data: StaticData::Result(fields),
            dynamic_data: Vec::new(),
        }
    }

    /// Build a carrier ramp-up packet.
    pub fn tx_ramp_up(us_counter: u32, carrier_khz: u32) -> Self {
        EventPacket {
            us_counter,
            static_data: StaticData::TxRampUp(TxRampUpFields { carrier_khz }),
            dynamic_data: Vec::new(),
        }
    }

    /// Build a carrier ramp-down packet.
    pub fn tx_ramp_down(us_counter: u32, reason: RampDownReason) -> Self {
        EventPacket {
            us_counter,
            static_data: StaticData::TxRampDown(TxRampDownFields { reason }),
            dynamic_data: Vec::new(),
        }
    }

    /// Build a custom packet carrying an application payload.
    pub fn custom(us_counter: u32, payload: Vec<u8>) -> Self {
        EventPacket {
            us_counter,
            static_data: StaticData::Custom(CustomFields {
                payload_len: payload.len() as u16,
            }),
            dynamic_data: payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_type_roundtrip() {
        for raw in 0x01..=0x0A {
            let ty = PacketType::from_u8(raw).expect("known type");
            assert_eq!(ty as u8, raw);
        }
        assert_eq!(PacketType::from_u8(0x00), None);
        assert_eq!(PacketType::from_u8(0x0B), None);
    }

    #[test]
    fn static_lengths_are_word_aligned() {
        for raw in 0x01..=0x0A {
            let ty = PacketType::from_u8(raw).unwrap();
            assert_eq!(ty.static_len() % 4, 0, "{:?} static record unaligned", ty);
        }
    }

    #[test]
    fn summary_reason_rejects_reserved_zero() {
        assert_eq!(SummaryReason::from_u8(0), None);
        assert_eq!(SummaryReason::from_u8(1), Some(SummaryReason::Done));
        assert_eq!(SummaryReason::from_u8(0xFF), None);
    }

    #[test]
    fn constructors_tag_the_right_variant() {
        let packet = EventPacket::tag_read(100, TagReadFields::default(), vec![1, 2]);
        assert_eq!(packet.packet_type(), PacketType::TagRead);

        let packet = EventPacket::result(5, ResultFields::default());
        assert_eq!(packet.packet_type(), PacketType::Result);
        assert!(packet.dynamic_data.is_empty());
    }
}
