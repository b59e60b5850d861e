//! Per-channel dwell-time tracking and channel hopping.
//!
//! Regulators budget how long a reader may occupy a channel and how long the
//! channel must then rest. [`ChannelTracker`] keeps the per-channel
//! bookkeeping; [`ActiveRegion`] combines it with a [`Region`]'s channel
//! plan to hand the engine the next hop frequency and the dwell budgets to
//! program into the device.

use crate::region::{BudgetPolicy, Region, RegulatoryTimers};

/// Dwell bookkeeping for one channel.
#[derive(Debug, Clone, Copy, Default)]
struct ChannelSlot {
    last_start_ms: u32,
    last_end_ms: u32,
    accumulated_on_ms: u32,
    /// A ramp-up has been recorded without a matching ramp-down.
    open: bool,
}

/// Tracks carrier on-time per channel.
///
/// Times are device milliseconds and wrap with the device clock; intervals
/// are computed with wrapping subtraction.
#[derive(Debug)]
pub struct ChannelTracker {
    slots: Vec<ChannelSlot>,
    off_same_channel_ms: u16,
}

impl ChannelTracker {
    /// Create a tracker for `channel_count` channels with the region's
    /// quiet-window length.
    pub fn new(channel_count: u16, off_same_channel_ms: u16) -> Self {
        ChannelTracker {
            slots: vec![ChannelSlot::default(); channel_count as usize],
            off_same_channel_ms,
        }
    }

    /// Record a carrier ramp-up on a channel.
    ///
    /// If the channel has rested for less than the quiet window since its
    /// last ramp-down, the idle gap counts against the channel as if the
    /// carrier had stayed up; otherwise the accumulated on-time resets.
    pub fn timer_set_start(&mut self, channel: u16, now_ms: u32) {
        let off_ms = self.off_same_channel_ms as u32;
        let slot = &mut self.slots[channel as usize];
        let idle = now_ms.wrapping_sub(slot.last_end_ms);
        if idle < off_ms {
            slot.accumulated_on_ms += idle;
        } else {
            slot.accumulated_on_ms = 0;
        }
        slot.last_start_ms = now_ms;
        slot.open = true;
    }

    /// Record a carrier ramp-down on a channel, adding the elapsed on-time.
    pub fn timer_set_end(&mut self, channel: u16, now_ms: u32) {
        let slot = &mut self.slots[channel as usize];
        slot.accumulated_on_ms += now_ms.wrapping_sub(slot.last_start_ms);
        slot.last_end_ms = now_ms;
        slot.open = false;
    }

    /// Whether a ramp-up is recorded without a matching ramp-down.
    pub fn is_open(&self, channel: u16) -> bool {
        self.slots[channel as usize].open
    }

    /// On-time charged against the channel in the current quiet window,
    /// including any open interval up to `now_ms`.
    pub fn accumulated_on_ms(&self, channel: u16, now_ms: u32) -> u32 {
        let slot = &self.slots[channel as usize];
        let open_ms = if slot.open {
            now_ms.wrapping_sub(slot.last_start_ms)
        } else {
            0
        };
        slot.accumulated_on_ms + open_ms
    }

    /// Dwell budgets to program for a ramp onto `channel` at `now_ms`.
    pub fn get_timers(
        &self,
        region_timers: &RegulatoryTimers,
        policy: BudgetPolicy,
        channel: u16,
        now_ms: u32,
    ) -> RegulatoryTimers {
        match policy {
            BudgetPolicy::Fixed => *region_timers,
            BudgetPolicy::Carryover => {
                let used = self.accumulated_on_ms(channel, now_ms);
                let shrink = |budget_ms: u16| -> u16 {
                    (budget_ms as u32).saturating_sub(used) as u16
                };
                RegulatoryTimers {
                    nominal_ms: shrink(region_timers.nominal_ms),
                    extended_ms: shrink(region_timers.extended_ms),
                    regulatory_ms: shrink(region_timers.regulatory_ms),
                    off_same_channel_ms: region_timers.off_same_channel_ms,
                }
            }
        }
    }

    /// Forget all per-channel state.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = ChannelSlot::default();
        }
    }
}

/// A region in use: the static [`Region`] plus hop position and dwell
/// bookkeeping. Owned by the inventory engine.
#[derive(Debug)]
pub struct ActiveRegion {
    region: Region,
    tracker: ChannelTracker,
    hop_order: Vec<u16>,
    hop_index: usize,
    current: Option<u16>,
}

impl ActiveRegion {
    /// Wrap a region, starting at the first usable channel.
    ///
    /// # Panics
    ///
    /// Panics if the region's channel plan has no usable channels; there
    /// is nothing to hop to.
    pub fn new(region: Region) -> Self {
        let tracker = ChannelTracker::new(
            region.channels.count,
            region.timers.off_same_channel_ms,
        );
        let hop_order = region.channels.usable_indices();
        assert!(
            !hop_order.is_empty(),
            "channel plan has no usable channels"
        );
        ActiveRegion {
            region,
            tracker,
            hop_order,
            hop_index: 0,
            current: None,
        }
    }

    /// The region description.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Advance to the next hop channel and return its frequency.
    pub fn next_channel_khz(&mut self) -> u32 {
        let channel = self.hop_order[self.hop_index];
        self.hop_index = (self.hop_index + 1) % self.hop_order.len();
        self.current = Some(channel);
        self.region.channels.channel_khz(channel)
    }

    /// The channel the carrier was most recently assigned to.
    pub fn current_channel(&self) -> Option<u16> {
        self.current
    }

    /// Record a ramp-up reported by the device on `carrier_khz`. Falls back
    /// to the current hop channel when the frequency is off the plan grid.
    pub fn note_ramp_up(&mut self, carrier_khz: u32, now_ms: u32) {
        let channel = self
            .region
            .channels
            .channel_index(carrier_khz)
            .or(self.current);
        if let Some(channel) = channel {
            self.current = Some(channel);
            self.tracker.timer_set_start(channel, now_ms);
        }
    }

    /// Record a ramp-down reported by the device.
    pub fn note_ramp_down(&mut self, now_ms: u32) {
        if let Some(channel) = self.current {
            if self.tracker.is_open(channel) {
                self.tracker.timer_set_end(channel, now_ms);
            }
        }
    }

    /// Close out an open dwell interval whose ramp-down was never reported.
    /// Called before each ramp when the carrier is observed down.
    pub fn update_channel_time_tracking(&mut self, now_ms: u32) {
        self.note_ramp_down(now_ms);
    }

    /// Dwell budgets for a ramp onto `channel_khz` at `now_ms`.
    pub fn timers_for(&self, channel_khz: u32, now_ms: u32) -> RegulatoryTimers {
        match self.region.channels.channel_index(channel_khz) {
            Some(channel) => self.tracker.get_timers(
                &self.region.timers,
                self.region.budget_policy,
                channel,
                now_ms,
            ),
            None => self.region.timers,
        }
    }

    /// Direct access to the dwell bookkeeping.
    pub fn tracker(&self) -> &ChannelTracker {
        &self.tracker
    }

    /// Reset dwell bookkeeping and hop position.
    pub fn clear(&mut self) {
        self.tracker.clear();
        self.hop_index = 0;
        self.current = None;
    }
}
