//! Regulatory region descriptions.
//!
//! A [`Region`] is pure configuration data: the channel plan plus the dwell
//! budgets the local regulator imposes. Built-in constructors cover the two
//! regions the test fleet runs in; deployments elsewhere build a custom
//! `Region` from their own tables.

/// Identifies a regulatory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionId {
    /// United States, FCC part 15.
    Fcc,
    /// Europe, ETSI EN 302 208 lower band.
    EtsiLower,
    /// A caller-supplied region.
    Custom(u16),
}

/// Per-channel dwell budgets, in milliseconds.
///
/// `nominal_ms` is when the host should begin winding a round down,
/// `extended_ms` is when it must stop issuing new work, and
/// `regulatory_ms` is the hard limit the device enforces with an autonomous
/// ramp-down. `off_same_channel_ms` is how long the channel must stay quiet
/// before its on-time budget resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegulatoryTimers {
    /// Soft budget; the host starts ending the round here.
    pub nominal_ms: u16,
    /// Budget for finishing in-flight work.
    pub extended_ms: u16,
    /// Hard budget enforced by the device.
    pub regulatory_ms: u16,
    /// Quiet time after which accumulated on-time is forgiven.
    pub off_same_channel_ms: u16,
}

impl RegulatoryTimers {
    /// All-zero budgets: the device never times the carrier out. Used when
    /// the caller asks to keep the carrier up across rounds in regions
    /// without dwell limits.
    pub fn disabled() -> Self {
        RegulatoryTimers::default()
    }
}

/// How dwell budgets respond to accumulated on-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetPolicy {
    /// Budgets are the table values every time.
    Fixed,
    /// Budgets shrink by the on-time already spent on the channel within
    /// the current quiet window.
    Carryover,
}

/// The frequency plan for a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPlan {
    /// Center frequency of channel index 0, in kHz.
    pub start_freq_khz: u32,
    /// Spacing between adjacent channel centers, in kHz.
    pub spacing_khz: u32,
    /// Number of channels in the plan.
    pub count: u16,
    /// Indices actually permitted for transmission; `None` means all.
    pub usable: Option<Vec<u16>>,
    /// Whether hopping order should be randomized rather than sequential.
    pub random_hop: bool,
}

impl ChannelPlan {
    /// Center frequency of a channel index.
    pub fn channel_khz(&self, index: u16) -> u32 {
        self.start_freq_khz + self.spacing_khz * index as u32
    }

    /// Inverse of [`ChannelPlan::channel_khz`]. Returns `None` for
    /// frequencies off the plan grid.
    pub fn channel_index(&self, khz: u32) -> Option<u16> {
        if khz < self.start_freq_khz {
            return None;
        }
        let offset = khz - self.start_freq_khz;
        if offset % self.spacing_khz != 0 {
            return None;
        }
        let index = offset / self.spacing_khz;
        if index >= self.count as u32 {
            return None;
        }
        Some(index as u16)
    }

    /// The transmittable channel indices, in hop order.
    pub fn usable_indices(&self) -> Vec<u16> {
        match &self.usable {
            Some(indices) => indices.clone(),
            None => (0..self.count).collect(),
        }
    }
}

/// A complete regulatory region description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Region identity.
    pub region_id: RegionId,
    /// Dwell budgets applied per channel.
    pub timers: RegulatoryTimers,
    /// Frequency plan.
    pub channels: ChannelPlan,
    /// How budgets respond to recent on-time.
    pub budget_policy: BudgetPolicy,
    /// Maximum conducted power, in centi-dB-milliwatts.
    pub max_power_cdbm: i16,
}

impl Region {
    /// FCC part 15: 50 channels, 500 kHz spacing, frequency hopping with a
    /// 400 ms hard dwell and no same-channel quiet requirement.
    pub fn fcc() -> Self {
        Region {
            region_id: RegionId::Fcc,
            timers: RegulatoryTimers {
                nominal_ms: 200,
                extended_ms: 380,
                regulatory_ms: 400,
                off_same_channel_ms: 0,
            },
            channels: ChannelPlan {
                start_freq_khz: 902_750,
                spacing_khz: 500,
                count: 50,
                usable: None,
                random_hop: true,
            },
            budget_policy: BudgetPolicy::Fixed,
            max_power_cdbm: 3000,
        }
    }

    /// ETSI lower band: four 200 kHz channels out of a 16-channel grid,
    /// 4 s dwell with a 100 ms quiet window. Budgets are the table values
    /// on every ramp; only the quiet-window fold carries history.
    pub fn etsi_lower() -> Self {
        Region {
            region_id: RegionId::EtsiLower,
            timers: RegulatoryTimers {
                nominal_ms: 3800,
                extended_ms: 3980,
                regulatory_ms: 4000,
                off_same_channel_ms: 100,
            },
            channels: ChannelPlan {
                start_freq_khz: 865_100,
                spacing_khz: 200,
                count: 16,
                usable: Some(vec![4, 7, 10, 13]),
                random_hop: false,
            },
            budget_policy: BudgetPolicy::Fixed,
            max_power_cdbm: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_khz_and_index_are_inverses() {
        let plan = Region::etsi_lower().channels;
        assert_eq!(plan.channel_khz(4), 865_900);
        assert_eq!(plan.channel_index(865_900), Some(4));
        assert_eq!(plan.channel_index(865_950), None);
        assert_eq!(plan.channel_index(800_000), None);
    }

    #[test]
    fn fcc_uses_the_whole_plan() {
        let region = Region::fcc();
        assert_eq!(region.channels.usable_indices().len(), 50);
        assert_eq!(region.channels.channel_khz(49), 927_250);
    }

    #[test]
    fn etsi_usable_subset() {
        let region = Region::etsi_lower();
        assert_eq!(region.channels.usable_indices(), vec![4, 7, 10, 13]);
    }
}
