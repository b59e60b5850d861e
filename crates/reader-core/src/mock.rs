//! Scripted device implementation for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use gen2_commands::EncodedGen2Command;

use crate::config::{CarrierConfig, InventoryRoundConfig, InventoryRoundConfig2, RfMode, Target};
use crate::device::{DeviceError, DeviceOps, EnableKind};
use crate::region::RegulatoryTimers;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    /// `set_rf_mode` with the raw mode value.
    SetRfMode(u16),
    /// `ramp_carrier_on` with the channel and the programmed budgets.
    RampUp {
        /// Channel frequency in kHz.
        channel_khz: u32,
        /// Dwell budgets programmed for the ramp.
        timers: RegulatoryTimers,
    },
    /// `ramp_carrier_off`.
    RampDown,
    /// `start_inventory_round` with the fields the engine varies.
    StartRound {
        /// Round target.
        target: Target,
        /// Starting Q.
        initial_q: u8,
        /// Seeded rounds-at-min-Q counter.
        starting_min_q_count: u8,
        /// Seeded queries-since-EPC counter.
        starting_queries_count: u8,
        /// Whether Selects precede the round.
        send_selects: bool,
    },
    /// `wait_op_completion`.
    WaitOp,
    /// `write_gen2_sequence` with the number of commands written.
    WriteSequence(usize),
    /// `write_gen2_enables`.
    WriteEnables(EnableKind, Vec<bool>),
}

#[derive(Debug, Default)]
struct MockDeviceInner {
    time_us: u32,
    cw_on: bool,
    calls: Vec<DeviceCall>,
    start_round_results: VecDeque<Result<(), DeviceError>>,
    ramp_up_results: VecDeque<Result<(), DeviceError>>,
}

/// A device whose behavior is scripted by the test.
///
/// Clones share state, so a test keeps one clone to script and inspect while
/// the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    inner: Arc<Mutex<MockDeviceInner>>,
}

impl MockDevice {
    /// A device at time zero with the carrier down.
    pub fn new() -> Self {
        MockDevice::default()
    }

    /// Set the device clock.
    pub fn set_time_us(&self, time_us: u32) {
        self.inner.lock().time_us = time_us;
    }

    /// Advance the device clock.
    pub fn advance_us(&self, delta_us: u32) {
        let mut inner = self.inner.lock();
        inner.time_us = inner.time_us.wrapping_add(delta_us);
    }

    /// Force the carrier state, as if the device ramped on its own.
    pub fn set_cw_on(&self, on: bool) {
        self.inner.lock().cw_on = on;
    }

    /// Queue a result for the next `start_inventory_round` call. Unqueued
    /// calls succeed.
    pub fn script_start_round(&self, result: Result<(), DeviceError>) {
        self.inner.lock().start_round_results.push_back(result);
    }

    /// Queue a result for the next `ramp_carrier_on` call.
    pub fn script_ramp_up(&self, result: Result<(), DeviceError>) {
        self.inner.lock().ramp_up_results.push_back(result);
    }

    /// All calls recorded so far.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.inner.lock().calls.clone()
    }

    /// Recorded `StartRound` calls only.
    pub fn start_round_calls(&self) -> Vec<DeviceCall> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, DeviceCall::StartRound { .. }))
            .cloned()
            .collect()
    }
}

impl DeviceOps for MockDevice {
    fn device_time_us(&self) -> u32 {
        self.inner.lock().time_us
    }

    fn cw_is_on(&self) -> bool {
        self.inner.lock().cw_on
    }

    fn set_rf_mode(&mut self, mode: RfMode) -> Result<(), DeviceError> {
        self.inner.lock().calls.push(DeviceCall::SetRfMode(mode.0));
        Ok(())
    }

    fn ramp_carrier_on(&mut self, config: &CarrierConfig) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DeviceCall::RampUp {
            channel_khz: config.channel_khz,
            timers: config.timers,
        });
        let result = inner.ramp_up_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            inner.cw_on = true;
        }
        result
    }

    fn ramp_carrier_off(&mut self) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DeviceCall::RampDown);
        inner.cw_on = false;
        Ok(())
    }

    fn start_inventory_round(
        &mut self,
        config: &InventoryRoundConfig,
        config_2: &InventoryRoundConfig2,
        send_selects: bool,
    ) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        inner.calls.push(DeviceCall::StartRound {
            target: config.target,
            initial_q: config.initial_q,
            starting_min_q_count: config_2.starting_min_q_count,
            starting_queries_count: config_2.starting_max_queries_since_valid_epc_count,
            send_selects,
        });
        inner.start_round_results.pop_front().unwrap_or(Ok(()))
    }

    fn wait_op_completion(&mut self) -> Result<(), DeviceError> {
        self.inner.lock().calls.push(DeviceCall::WaitOp);
        Ok(())
    }

    fn write_gen2_sequence(
        &mut self,
        commands: &[EncodedGen2Command],
    ) -> Result<(), DeviceError> {
        self.inner
            .lock()
            .calls
            .push(DeviceCall::WriteSequence(commands.len()));
        Ok(())
    }

    fn write_gen2_enables(
        &mut self,
        kind: EnableKind,
        enables: &[bool],
    ) -> Result<(), DeviceError> {
        self.inner
            .lock()
            .calls
            .push(DeviceCall::WriteEnables(kind, enables.to_vec()));
        Ok(())
    }
}
