//! Continuous inventory state machine.
//!
//! The engine drives the device through back-to-back inventory rounds until
//! a stop condition fires, reacting to the event stream as it is delivered.
//! It owns the device handle, the regulatory bookkeeping and the producer
//! half of the event queue; nothing else mutates session state, so the
//! engine lives on a single delivery thread and callers observe it through
//! snapshots.

use tracing::{debug, trace, warn};

use gen2_commands::Gen2Command;
use gen2_events::{
    decode_packet, ByteCursor, ContinuousInventorySummaryFields, EventPacket,
    InventoryRoundSummaryFields, ResultFields, StaticData, StopReason, SummaryReason,
};

use crate::config::{
    CarrierConfig, InventoryRoundConfig, InventoryRoundConfig2, SessionParams, Target,
};
use crate::device::{DeviceError, DeviceOps};
use crate::error::ReaderError;
use crate::gen2_buffer::{Gen2BufferError, Gen2CommandBuffer};
use crate::queue::PacketSender;
use crate::region::RegulatoryTimers;
use crate::regulatory::ActiveRegion;

/// Module byte stamped into synthesized `Result` packets.
const RESULT_MODULE_INVENTORY: u8 = 1;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryPhase {
    /// No session running.
    Idle,
    /// Rounds are being issued.
    Ongoing,
    /// A host stop is pending; the session ends at the next round summary.
    StopRequested,
}

/// Observable session state. Cloned out as a snapshot; the engine keeps the
/// only mutable copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuousInventoryState {
    /// Lifecycle phase.
    pub phase: InventoryPhase,
    /// Why the session stopped (or will stop). Sticky: the first cause
    /// wins.
    pub stop_reason: Option<StopReason>,
    /// Target the next round will query.
    pub target: Target,
    /// Completed rounds this session.
    pub round_count: u32,
    /// Tags singulated this session.
    pub tag_count: u32,
    /// Q reported by the most recent round summary.
    pub previous_q: u8,
    /// Carried rounds-at-min-Q counter.
    pub min_q_count: u8,
    /// Carried queries-since-valid-EPC counter.
    pub queries_since_valid_epc_count: u8,
    /// Reason from the most recent round summary.
    pub done_reason: Option<SummaryReason>,
    /// Device failure that ended the session, when one did.
    pub last_device_error: Option<DeviceError>,
}

impl ContinuousInventoryState {
    fn idle(target: Target) -> Self {
        ContinuousInventoryState {
            phase: InventoryPhase::Idle,
            stop_reason: None,
            target,
            round_count: 0,
            tag_count: 0,
            previous_q: 0,
            min_q_count: 0,
            queries_since_valid_epc_count: 0,
            done_reason: None,
            last_device_error: None,
        }
    }
}

/// The continuous inventory engine.
///
/// Generic over the device so tests drive it with a scripted implementation.
pub struct ContinuousInventoryEngine<D: DeviceOps> {
    device: D,
    region: ActiveRegion,
    events: PacketSender,
    gen2_buffer: Gen2CommandBuffer,
    params: SessionParams,
    /// Working round config; diverges from `params.round_config` as the
    /// target flips and Q state is carried across rounds.
    round_config: InventoryRoundConfig,
    round_config_2: InventoryRoundConfig2,
    state: ContinuousInventoryState,
    start_time_us: u32,
}

impl<D: DeviceOps> ContinuousInventoryEngine<D> {
    /// Build an idle engine.
    pub fn new(device: D, region: ActiveRegion, events: PacketSender) -> Self {
        let params = SessionParams::new(crate::config::RfMode(0), 0);
        ContinuousInventoryEngine {
            device,
            region,
            events,
            gen2_buffer: Gen2CommandBuffer::new(),
            round_config: params.round_config,
            round_config_2: params.round_config_2,
            state: ContinuousInventoryState::idle(params.round_config.target),
            params,
            start_time_us: 0,
        }
    }

    // ========================================================================
    // Session control
    // ========================================================================

    /// Start a continuous inventory session.
    ///
    /// Rejects the call without touching any state if no stop condition is
    /// armed or the round configuration is out of range. On a device error
    /// while issuing the first round the engine reverts to idle and the
    /// error is returned directly; nothing is published to the queue.
    pub fn continuous_inventory(&mut self, params: SessionParams) -> Result<(), ReaderError> {
        if !params.stop_conditions.any_set() {
            return Err(ReaderError::InvalidParameter("stop_conditions"));
        }
        if params.round_config.session > 3 {
            return Err(ReaderError::InvalidParameter("session"));
        }
        if params.round_config.select > 3 {
            return Err(ReaderError::InvalidParameter("select"));
        }

        self.state = ContinuousInventoryState::idle(params.round_config.target);
        self.state.phase = InventoryPhase::Ongoing;
        self.state.previous_q = params.round_config.initial_q;
        self.round_config = params.round_config;
        self.round_config_2 = params.round_config_2;
        self.params = params;
        self.start_time_us = self.device.device_time_us();

        debug!(
            round_target = ?self.state.target,
            initial_q = self.round_config.initial_q,
            "continuous inventory starting"
        );

        let result = self
            .device
            .set_rf_mode(self.params.rf_mode)
            .map_err(ReaderError::from)
            .and_then(|()| self.start_round());
        if let Err(err) = result {
            self.state.phase = InventoryPhase::Idle;
            return Err(err);
        }
        Ok(())
    }

    /// Start one inventory round outside a continuous session, with the
    /// same ramp handling and race recovery. Used by tag-access flows that
    /// need to halt on a specific tag.
    pub fn inventory(&mut self, params: SessionParams) -> Result<(), ReaderError> {
        if params.round_config.session > 3 {
            return Err(ReaderError::InvalidParameter("session"));
        }
        if params.round_config.select > 3 {
            return Err(ReaderError::InvalidParameter("select"));
        }
        self.round_config = params.round_config;
        self.round_config_2 = params.round_config_2;
        self.params = params;
        self.device.set_rf_mode(self.params.rf_mode)?;
        self.start_round()
    }

    /// Request that the session stop and drop the carrier.
    ///
    /// The stop is observed at the next round summary; the summary packet
    /// arrives on the queue with reason `Host`. The carrier is ramped down
    /// unconditionally, so this is also the plain "transmitter off" call
    /// and is idempotent on an idle engine.
    pub fn stop_transmitting(&mut self) -> Result<(), ReaderError> {
        if self.state.phase == InventoryPhase::Ongoing {
            self.state.phase = InventoryPhase::StopRequested;
            debug!("stop requested");
        }
        self.device.ramp_carrier_off()?;
        Ok(())
    }

    /// A snapshot of the session state.
    pub fn get_continuous_inventory_state(&self) -> ContinuousInventoryState {
        self.state.clone()
    }

    /// Publish a host-built packet onto the event queue.
    pub fn insert_packet(&mut self, packet: EventPacket) -> Result<(), ReaderError> {
        self.events
            .push_back(packet)
            .map_err(|_| ReaderError::EventFifoFull)
    }

    // ========================================================================
    // Event delivery
    // ========================================================================

    /// Feed raw event stream bytes from the transport.
    ///
    /// Decodes packet by packet; a malformed record stops decoding and the
    /// remainder of the buffer is discarded, since packet boundaries cannot
    /// be trusted past it.
    pub fn handle_event_bytes(&mut self, bytes: &[u8]) {
        let mut cursor = ByteCursor::new(bytes);
        while cursor.remaining() > 0 {
            let packet = match decode_packet(&mut cursor) {
                Ok(packet) => packet,
                Err(err) => {
                    warn!(
                        error = %err,
                        discarded = cursor.remaining(),
                        "bad event record, discarding rest of buffer"
                    );
                    return;
                }
            };
            self.deliver(packet);
        }
    }

    /// Publish one packet and react to it. Publication happens first so any
    /// synthesized packets land behind their cause.
    fn deliver(&mut self, packet: EventPacket) {
        let us = packet.us_counter;
        let static_data = packet.static_data;
        if self.events.push_back(packet).is_err() {
            warn!("event queue overflow");
            if self.state.phase != InventoryPhase::Idle {
                self.fail_session(ReaderError::EventFifoFull, us);
            }
            return;
        }
        self.handle_packet(us, &static_data);
    }

    fn handle_packet(&mut self, us: u32, static_data: &StaticData) {
        match static_data {
            StaticData::TxRampUp(fields) => {
                trace!(khz = fields.carrier_khz, "carrier up");
                self.region.note_ramp_up(fields.carrier_khz, us / 1000);
            }
            StaticData::TxRampDown(fields) => {
                trace!(reason = ?fields.reason, "carrier down");
                self.region.note_ramp_down(us / 1000);
            }
            StaticData::TagRead(_) => {
                if self.state.phase != InventoryPhase::Idle {
                    self.state.tag_count += 1;
                }
            }
            StaticData::InventoryRoundSummary(fields) => {
                if self.state.phase != InventoryPhase::Idle {
                    self.handle_round_summary(us, fields);
                }
            }
            _ => {}
        }
    }

    fn handle_round_summary(&mut self, us: u32, fields: &InventoryRoundSummaryFields) {
        self.state.min_q_count = fields.min_q_count;
        self.state.queries_since_valid_epc_count = fields.queries_since_valid_epc_count;

        let reason = match SummaryReason::from_u8(fields.reason) {
            Some(reason) => reason,
            None => {
                warn!(raw = fields.reason, "unrecognized round summary reason");
                self.fail_session(ReaderError::SummaryReasonInvalid, us);
                return;
            }
        };
        self.state.done_reason = Some(reason);
        trace!(?reason, final_q = fields.final_q, "round summary");

        match reason {
            SummaryReason::Done | SummaryReason::Host => {
                self.state.round_count += 1;
            }
            SummaryReason::Regulatory => {
                // The round was cut short by the dwell timer; the next
                // round resumes with this Q rather than starting over.
                self.state.previous_q = fields.final_q;
            }
            SummaryReason::Unsupported | SummaryReason::TxNotRampedUp => {}
            SummaryReason::EventFifoFull => {
                self.fail_session(ReaderError::EventFifoFull, us);
                return;
            }
            SummaryReason::InvalidParam => {
                self.fail_session(ReaderError::InvalidParam, us);
                return;
            }
            SummaryReason::LmacOverload => {
                self.fail_session(ReaderError::LmacOverload, us);
                return;
            }
            SummaryReason::None => {
                self.fail_session(ReaderError::SummaryReasonInvalid, us);
                return;
            }
        }

        self.check_stop_conditions(us);
        if self.state.stop_reason.is_some() {
            self.finish_session(us);
        } else {
            self.continue_continuous_inventory(reason, us);
        }
    }

    // ========================================================================
    // Round continuation
    // ========================================================================

    fn continue_continuous_inventory(&mut self, reason: SummaryReason, us: u32) {
        let mut q_was_reset = false;

        if self.params.dual_target {
            if reason == SummaryReason::Done {
                self.state.target = self.state.target.flip();
                self.reset_round_config();
                q_was_reset = true;
            }
            // Session 0 inventoried flags do not persist once the carrier
            // drops, so every tag is back on target A. A single-target
            // session keeps its configured target either way.
            if !self.device.cw_is_on() && self.round_config.session == 0 {
                self.state.target = Target::A;
                self.reset_round_config();
                q_was_reset = true;
            }
        } else if reason == SummaryReason::Done {
            self.reset_round_config();
            q_was_reset = true;
        }

        if !q_was_reset && reason == SummaryReason::Regulatory {
            self.round_config.initial_q = self.state.previous_q;
            self.round_config_2.starting_min_q_count = self.state.min_q_count;
            self.round_config_2.starting_max_queries_since_valid_epc_count =
                self.state.queries_since_valid_epc_count;
        }

        if let Err(err) = self.start_round() {
            self.fail_session(err, us);
        }
    }

    /// Restore the caller's round configuration with the current target.
    fn reset_round_config(&mut self) {
        self.round_config = self.params.round_config;
        self.round_config.target = self.state.target;
        self.round_config_2 = self.params.round_config_2;
    }

    fn start_round(&mut self) -> Result<(), ReaderError> {
        if !self.device.cw_is_on() {
            self.ramp_for_inventory()?;
        }
        match self.device.start_inventory_round(
            &self.round_config,
            &self.round_config_2,
            self.params.send_selects,
        ) {
            Ok(()) => Ok(()),
            Err(err) if err.is_select_tx_race() => {
                // The regulatory timer dropped the carrier between our
                // cw check and the Select hitting the radio. Re-ramp and
                // retry once; a second failure is real.
                debug!("select raced carrier ramp-down, retrying");
                self.ramp_for_inventory()?;
                self.device
                    .start_inventory_round(
                        &self.round_config,
                        &self.round_config_2,
                        self.params.send_selects,
                    )
                    .map_err(ReaderError::from)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn ramp_for_inventory(&mut self) -> Result<(), ReaderError> {
        let now_ms = self.device.device_time_us() / 1000;
        // Close any dwell interval whose ramp-down packet never arrived.
        self.region.update_channel_time_tracking(now_ms);

        let channel_khz = self.region.next_channel_khz();
        let timers = if self.params.remain_on {
            RegulatoryTimers::disabled()
        } else {
            self.region.timers_for(channel_khz, now_ms)
        };
        trace!(khz = channel_khz, ?timers, "ramping carrier");
        self.device.ramp_carrier_on(&CarrierConfig {
            channel_khz,
            tx_power_cdbm: self.params.tx_power_cdbm,
            timers,
        })?;
        self.device.wait_op_completion()?;
        Ok(())
    }

    // ========================================================================
    // Stop handling
    // ========================================================================

    /// Evaluate stop conditions at `us`. The first condition to fire is
    /// recorded and later checks never overwrite it.
    fn check_stop_conditions(&mut self, us: u32) {
        if self.state.stop_reason.is_some() {
            return;
        }
        let stop = &self.params.stop_conditions;
        if stop.max_number_of_rounds != 0 && self.state.round_count >= stop.max_number_of_rounds
        {
            self.state.stop_reason = Some(StopReason::MaxNumberOfRounds);
        } else if stop.max_number_of_tags != 0
            && self.state.tag_count >= stop.max_number_of_tags
        {
            self.state.stop_reason = Some(StopReason::MaxNumberOfTags);
        } else if stop.max_duration_us != 0
            && us.wrapping_sub(self.start_time_us) >= stop.max_duration_us
        {
            self.state.stop_reason = Some(StopReason::MaxDuration);
        } else if self.state.phase == InventoryPhase::StopRequested {
            self.state.stop_reason = Some(StopReason::Host);
        }
    }

    /// End the session normally: publish the summary and go idle.
    fn finish_session(&mut self, us: u32) {
        let reason = self.state.stop_reason.unwrap_or(StopReason::None);
        debug!(?reason, rounds = self.state.round_count, "session complete");
        self.push_summary(us, reason, 0, 0);
        self.state.phase = InventoryPhase::Idle;
        if !self.params.remain_on {
            if let Err(err) = self.device.ramp_carrier_off() {
                warn!(error = %err, "ramp down after session failed");
            }
        }
    }

    /// End the session on an error: publish a `Result` packet naming the
    /// failure, then the summary, and go idle.
    fn fail_session(&mut self, err: ReaderError, us: u32) {
        let reason = err.stop_reason();
        if self.state.stop_reason.is_none() {
            self.state.stop_reason = Some(reason);
        }
        let (op_id, op_error) = match err {
            ReaderError::Device(device_err) => {
                self.state.last_device_error = Some(device_err);
                (device_err.op_id as u8, device_err.op_error as u8)
            }
            _ => (0, 0),
        };
        warn!(error = %err, "session failed");

        let result = EventPacket::result(
            us,
            ResultFields {
                module: RESULT_MODULE_INVENTORY,
                result_code: reason as u8,
                op_id,
                op_error,
            },
        );
        if self.events.push_back(result).is_err() {
            warn!("dropping error report, event queue full");
        }
        let reported = self.state.stop_reason.unwrap_or(reason);
        self.push_summary(us, reported, op_id, op_error);
        self.state.phase = InventoryPhase::Idle;
    }

    fn push_summary(&mut self, us: u32, reason: StopReason, op_id: u8, op_error: u8) {
        let mut duration_us = us.wrapping_sub(self.start_time_us);
        // A summary never reports more than the requested duration; the
        // check necessarily runs some time after the threshold passed.
        if reason == StopReason::MaxDuration {
            duration_us = duration_us.min(self.params.stop_conditions.max_duration_us);
        }
        let summary = EventPacket::continuous_summary(
            us,
            ContinuousInventorySummaryFields {
                duration_us,
                number_of_inventory_rounds: self.state.round_count,
                number_of_tags: self.state.tag_count,
                reason: reason as u8,
                last_op_id: op_id,
                last_op_error: op_error,
            },
        );
        if self.events.push_back(summary).is_err() {
            warn!("dropping session summary, event queue full");
        }
    }

    // ========================================================================
    // Gen2 command buffer access
    // ========================================================================

    /// Discard the local Gen2 command sequence.
    pub fn gen2_clear_local_sequence(&mut self) {
        self.gen2_buffer.clear_local_sequence();
    }

    /// Encode and append a command, returning its slot index.
    pub fn gen2_append_command(
        &mut self,
        command: &Gen2Command,
        transaction_id: u8,
    ) -> Result<usize, Gen2BufferError> {
        self.gen2_buffer
            .encode_and_append_command(command, transaction_id)
    }

    /// Push the local sequence to the device.
    pub fn gen2_write_sequence(&mut self) -> Result<(), Gen2BufferError> {
        self.gen2_buffer.write_sequence(&mut self.device)
    }

    /// Program the halted-on-tag enable bitmap.
    pub fn gen2_write_halted_enables(
        &mut self,
        enables: &[bool],
    ) -> Result<usize, Gen2BufferError> {
        self.gen2_buffer.write_halted_enables(enables, &mut self.device)
    }

    /// Program the auto-access enable bitmap.
    pub fn gen2_write_auto_access_enables(
        &mut self,
        enables: &[bool],
    ) -> Result<usize, Gen2BufferError> {
        self.gen2_buffer
            .write_auto_access_enables(enables, &mut self.device)
    }

    /// Program the pre-round Select enable bitmap.
    pub fn gen2_write_select_enables(
        &mut self,
        enables: &[bool],
    ) -> Result<usize, Gen2BufferError> {
        self.gen2_buffer.write_select_enables(enables, &mut self.device)
    }

    /// The buffered command in a slot, if any.
    pub fn gen2_command_at(&self, index: usize) -> Option<&Gen2Command> {
        self.gen2_buffer.command_at(index)
    }

    /// The regulatory bookkeeping, for diagnostics.
    pub fn region(&self) -> &ActiveRegion {
        &self.region
    }
}
