//! Session and round configuration.

use crate::region::RegulatoryTimers;

/// Modulation/backscatter mode index programmed into the radio. The value
/// set is calibration-dependent, so it is carried opaquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfMode(pub u16);

/// Gen2 inventoried-flag target for a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Target {
    /// Query tags whose inventoried flag is A.
    A = 0,
    /// Query tags whose inventoried flag is B.
    B = 1,
}

impl Target {
    /// The opposite target.
    pub fn flip(self) -> Target {
        match self {
            Target::A => Target::B,
            Target::B => Target::A,
        }
    }
}

/// Q-algorithm and round parameters, mirroring the device's round
/// configuration register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryRoundConfig {
    /// Starting Q for the round.
    pub initial_q: u8,
    /// Upper bound for Q adjustment.
    pub max_q: u8,
    /// Lower bound for Q adjustment.
    pub min_q: u8,
    /// Rounds the algorithm must spend at `min_q` before ending.
    pub num_min_q_cycles: u8,
    /// Disable Q adjustment entirely.
    pub fixed_q_mode: bool,
    /// Use Query (not QueryAdjust) when increasing Q.
    pub q_increase_use_query: bool,
    /// Use Query (not QueryAdjust) when decreasing Q.
    pub q_decrease_use_query: bool,
    /// Gen2 session, 0..=3.
    pub session: u8,
    /// Query Sel field, 0..=3.
    pub select: u8,
    /// Inventoried-flag target.
    pub target: Target,
    /// Halt on every singulated tag for host access.
    pub halt_on_all_tags: bool,
    /// Assert TagFocus in the Query.
    pub tag_focus_enable: bool,
    /// Ask tags for FastID replies.
    pub fast_id_enable: bool,
}

impl Default for InventoryRoundConfig {
    fn default() -> Self {
        InventoryRoundConfig {
            initial_q: 4,
            max_q: 15,
            min_q: 0,
            num_min_q_cycles: 1,
            fixed_q_mode: false,
            q_increase_use_query: false,
            q_decrease_use_query: false,
            session: 0,
            select: 0,
            target: Target::A,
            halt_on_all_tags: false,
            tag_focus_enable: false,
            fast_id_enable: false,
        }
    }
}

/// Extended round parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InventoryRoundConfig2 {
    /// End the round after this many queries without a valid EPC; zero
    /// disables the check.
    pub max_queries_since_valid_epc: u16,
    /// Seed value for the rounds-at-min-Q counter, used when resuming a
    /// regulatory-interrupted round.
    pub starting_min_q_count: u8,
    /// Seed value for the queries-since-valid-EPC counter.
    pub starting_max_queries_since_valid_epc_count: u8,
}

/// When a continuous inventory session should stop. Zero disables a
/// condition; at least one must be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopConditions {
    /// Stop after this many completed rounds.
    pub max_number_of_rounds: u32,
    /// Stop after this many singulated tags.
    pub max_number_of_tags: u32,
    /// Stop after this much elapsed time, in microseconds.
    pub max_duration_us: u32,
}

impl StopConditions {
    /// Whether any condition is armed.
    pub fn any_set(&self) -> bool {
        self.max_number_of_rounds != 0
            || self.max_number_of_tags != 0
            || self.max_duration_us != 0
    }
}

/// Everything needed to ramp the carrier onto a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierConfig {
    /// Channel center frequency, in kHz.
    pub channel_khz: u32,
    /// Transmit power, in centi-dB-milliwatts.
    pub tx_power_cdbm: i16,
    /// Dwell budgets the device should enforce for this ramp.
    pub timers: RegulatoryTimers,
}

/// Full parameter set for a continuous inventory session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Antenna port to transmit on.
    pub antenna: u8,
    /// Modulation mode.
    pub rf_mode: RfMode,
    /// Transmit power, in centi-dB-milliwatts.
    pub tx_power_cdbm: i16,
    /// Round configuration; also the reset state for Q.
    pub round_config: InventoryRoundConfig,
    /// Extended round configuration.
    pub round_config_2: InventoryRoundConfig2,
    /// Transmit the buffered Select sequence before each round.
    pub send_selects: bool,
    /// Session stop conditions.
    pub stop_conditions: StopConditions,
    /// Alternate the target between rounds to keep tags visible.
    pub dual_target: bool,
    /// Keep the carrier up between rounds instead of hopping. Only legal
    /// in regions without dwell limits.
    pub remain_on: bool,
}

impl SessionParams {
    /// A baseline session: dual target, session 0, no selects, carrier
    /// hopping. Callers set stop conditions before use.
    pub fn new(rf_mode: RfMode, tx_power_cdbm: i16) -> Self {
        SessionParams {
            antenna: 1,
            rf_mode,
            tx_power_cdbm,
            round_config: InventoryRoundConfig::default(),
            round_config_2: InventoryRoundConfig2::default(),
            send_selects: false,
            stop_conditions: StopConditions::default(),
            dual_target: true,
            remain_on: false,
        }
    }
}
