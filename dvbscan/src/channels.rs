//! Channel plans and blind sweep candidates.
//!
//! A plan numbers the channels of a band and knows their centre
//! frequencies. The sweep walks modulation, channel, frequency offset and
//! symbol rate, in that order, and stops trying symbol rates for a channel
//! once one of them locks.

use std::fmt;

use dvbscan_si::{
    AtscParams, Bandwidth, CableParams, FrontendParameters, FrontendType, Inversion, Modulation,
    SatelliteParams, TerrestrialParams,
};

/// DVB-C symbol rates in probing order.
pub const DVBC_SYMBOL_RATES: [u32; 18] = [
    6_900_000, 6_875_000, 6_956_500, 6_956_000, 6_952_000, 6_950_000, 6_790_000, 6_811_000,
    6_250_000, 6_111_000, 6_086_000, 5_900_000, 5_483_000, 5_217_000, 5_156_000, 5_000_000,
    4_000_000, 3_450_000,
];

/// DVB-C modulation by index.
pub fn dvbc_modulation(index: usize) -> Modulation {
    match index {
        0 => Modulation::Qam64,
        1 => Modulation::Qam256,
        2 => Modulation::Qam128,
        _ => Modulation::QamAuto,
    }
}

/// Highest symbol rate that fits a channel with roll-off 0.15.
pub fn max_symbol_rate(bandwidth: Bandwidth) -> u32 {
    (f64::from(bandwidth.hz()) / 1.15) as u32
}

/// One channel of a plan. Frequencies in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    pub number: u16,
    pub frequency: u32,
    pub bandwidth: Bandwidth,
}

/// Channels to sweep and the offsets tried around each centre frequency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelList {
    pub channels: Vec<Channel>,
    /// Offsets in Hz, normally starting with 0.
    pub offsets: Vec<i32>,
}

impl ChannelList {
    /// Channel frequencies in Hz, offsets disabled.
    pub fn from_frequencies(frequencies: &[u32], bandwidth: Bandwidth) -> Self {
        ChannelList {
            channels: frequencies
                .iter()
                .enumerate()
                .map(|(i, &frequency)| Channel {
                    number: i as u16,
                    frequency,
                    bandwidth,
                })
                .collect(),
            offsets: vec![0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPlan {
    DvbtEurope,
    DvbtAustralia,
    DvbcEurope,
    AtscVsb,
    AtscQam,
}

fn spaced(numbers: std::ops::RangeInclusive<u16>, base: u32, step: u32, bandwidth: Bandwidth) -> Vec<Channel> {
    numbers
        .map(|number| Channel {
            number,
            frequency: base + u32::from(number) * step,
            bandwidth,
        })
        .collect()
}

/// North American 6 MHz centre frequencies.
fn us_channel(number: u16, cable: bool) -> Option<u32> {
    let n = u32::from(number);
    let mhz = |v: u32| v * 1_000_000;
    Some(match n {
        2..=4 => mhz(57 + (n - 2) * 6),
        5..=6 => mhz(79 + (n - 5) * 6),
        7..=13 => mhz(177 + (n - 7) * 6),
        14..=22 if cable => mhz(123 + (n - 14) * 6),
        23..=94 if cable => mhz(219 + (n - 23) * 6),
        95..=99 if cable => mhz(93 + (n - 95) * 6),
        100..=135 if cable => mhz(651 + (n - 100) * 6),
        14..=51 if !cable => mhz(473 + (n - 14) * 6),
        _ => return None,
    })
}

impl ChannelPlan {
    pub const ALL: [ChannelPlan; 5] = [
        ChannelPlan::DvbtEurope,
        ChannelPlan::DvbtAustralia,
        ChannelPlan::DvbcEurope,
        ChannelPlan::AtscVsb,
        ChannelPlan::AtscQam,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ChannelPlan::DvbtEurope => "dvbt-eu",
            ChannelPlan::DvbtAustralia => "dvbt-au",
            ChannelPlan::DvbcEurope => "dvbc-eu",
            ChannelPlan::AtscVsb => "atsc-vsb",
            ChannelPlan::AtscQam => "atsc-qam",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ChannelPlan::DvbtEurope => "DVB-T Europe, VHF 5-12 (7 MHz), UHF 21-69 (8 MHz)",
            ChannelPlan::DvbtAustralia => "DVB-T Australia, VHF 6-12, UHF 27-69 (7 MHz)",
            ChannelPlan::DvbcEurope => "DVB-C Europe, 113-858 MHz (8 MHz)",
            ChannelPlan::AtscVsb => "ATSC US terrestrial, channels 2-51 (8VSB)",
            ChannelPlan::AtscQam => "ATSC US cable, channels 2-135 (QAM256)",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|plan| plan.name().eq_ignore_ascii_case(name))
    }

    pub fn frontend_type(self) -> FrontendType {
        match self {
            ChannelPlan::DvbtEurope | ChannelPlan::DvbtAustralia => FrontendType::Terrestrial,
            ChannelPlan::DvbcEurope => FrontendType::Cable,
            ChannelPlan::AtscVsb | ChannelPlan::AtscQam => FrontendType::Atsc,
        }
    }

    /// Default plan of a delivery system, if it has one.
    pub fn default_for(frontend: FrontendType) -> Option<Self> {
        match frontend {
            FrontendType::Terrestrial => Some(ChannelPlan::DvbtEurope),
            FrontendType::Cable => Some(ChannelPlan::DvbcEurope),
            FrontendType::Atsc => Some(ChannelPlan::AtscVsb),
            FrontendType::Satellite => None,
        }
    }

    /// `offsets` enables the plan's frequency offsets, where it has any.
    pub fn channel_list(self, offsets: bool) -> ChannelList {
        let (channels, plan_offsets) = match self {
            ChannelPlan::DvbtEurope => {
                let mut channels = spaced(5..=12, 142_500_000, 7_000_000, Bandwidth::Mhz7);
                channels.extend(spaced(21..=69, 306_000_000, 8_000_000, Bandwidth::Mhz8));
                (channels, vec![0, 166_000, -166_000])
            }
            ChannelPlan::DvbtAustralia => {
                let mut channels = spaced(6..=12, 135_500_000, 7_000_000, Bandwidth::Mhz7);
                channels.extend(spaced(27..=69, 333_500_000, 7_000_000, Bandwidth::Mhz7));
                (channels, vec![0, 125_000])
            }
            ChannelPlan::DvbcEurope => {
                let channels = (0..)
                    .map(|i: u16| Channel {
                        number: i,
                        frequency: 113_000_000 + u32::from(i) * 8_000_000,
                        bandwidth: Bandwidth::Mhz8,
                    })
                    .take_while(|c| c.frequency <= 858_000_000)
                    .collect();
                (channels, vec![0])
            }
            ChannelPlan::AtscVsb | ChannelPlan::AtscQam => {
                let cable = self == ChannelPlan::AtscQam;
                let channels = (2..=135)
                    .filter_map(|number| {
                        us_channel(number, cable).map(|frequency| Channel {
                            number,
                            frequency,
                            bandwidth: Bandwidth::Mhz6,
                        })
                    })
                    .collect();
                (channels, vec![0])
            }
        };
        ChannelList {
            channels,
            offsets: if offsets { plan_offsets } else { vec![0] },
        }
    }
}

impl fmt::Display for ChannelPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One pass of the sweep: a modulation over a channel list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPass {
    pub modulation: Modulation,
    pub channels: ChannelList,
    /// Cable only; empty for the other delivery systems.
    pub symbol_rates: Vec<u32>,
}

/// Candidates of one channel and offset. Only the first one that locks is kept.
pub type SweepGroup = Vec<FrontendParameters>;

impl SweepPass {
    pub fn groups(&self, frontend: FrontendType, inversion: Inversion) -> Vec<SweepGroup> {
        let mut groups = Vec::new();
        for channel in &self.channels.channels {
            for &offset in &self.channels.offsets {
                let Some(frequency) = channel.frequency.checked_add_signed(offset) else {
                    continue;
                };
                let group: SweepGroup = match frontend {
                    FrontendType::Terrestrial => vec![FrontendParameters::Terrestrial(TerrestrialParams {
                        frequency,
                        inversion,
                        bandwidth: channel.bandwidth,
                        ..Default::default()
                    })],
                    FrontendType::Cable => self
                        .symbol_rates
                        .iter()
                        .filter(|&&rate| rate <= max_symbol_rate(channel.bandwidth))
                        .map(|&symbol_rate| {
                            FrontendParameters::Cable(CableParams {
                                frequency,
                                inversion,
                                symbol_rate,
                                modulation: self.modulation,
                                ..Default::default()
                            })
                        })
                        .collect(),
                    FrontendType::Atsc => vec![FrontendParameters::Atsc(AtscParams {
                        frequency,
                        inversion,
                        modulation: self.modulation,
                    })],
                    FrontendType::Satellite => Vec::new(),
                };
                if !group.is_empty() {
                    groups.push(group);
                }
            }
        }
        groups
    }
}

/// Cable sweep axes from the command line switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CableSweep {
    /// Fixed modulation index, see [`dvbc_modulation`].
    pub modulation: Option<usize>,
    /// Fixed symbol rate index into [`DVBC_SYMBOL_RATES`].
    pub symbol_rate: Option<usize>,
    /// Bit 0: every symbol rate. Bit 1: include QAM128.
    pub extended: u8,
}

impl CableSweep {
    /// Modulations to sweep; a frontend with QAM auto detection needs one pass only.
    pub fn modulations(&self, qam_auto: bool) -> Vec<Modulation> {
        match self.modulation {
            Some(index) => vec![dvbc_modulation(index)],
            None if qam_auto => vec![Modulation::QamAuto],
            None if self.extended & 0x02 != 0 => (0..3).map(dvbc_modulation).collect(),
            None => (0..2).map(dvbc_modulation).collect(),
        }
    }

    pub fn symbol_rates(&self) -> Vec<u32> {
        match self.symbol_rate {
            Some(index) => DVBC_SYMBOL_RATES.get(index).copied().into_iter().collect(),
            None if self.extended & 0x01 != 0 => DVBC_SYMBOL_RATES.to_vec(),
            None => DVBC_SYMBOL_RATES[..2].to_vec(),
        }
    }
}

/// Which ATSC plans to sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtscType {
    Terrestrial,
    Cable,
    Both,
}

impl AtscType {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(AtscType::Terrestrial),
            2 => Some(AtscType::Cable),
            3 => Some(AtscType::Both),
            _ => None,
        }
    }

    pub fn passes(self, offsets: bool) -> Vec<SweepPass> {
        let vsb = || SweepPass {
            modulation: Modulation::Vsb8,
            channels: ChannelPlan::AtscVsb.channel_list(offsets),
            symbol_rates: Vec::new(),
        };
        let qam = || SweepPass {
            modulation: Modulation::Qam256,
            channels: ChannelPlan::AtscQam.channel_list(offsets),
            symbol_rates: Vec::new(),
        };
        match self {
            AtscType::Terrestrial => vec![vsb()],
            AtscType::Cable => vec![qam()],
            AtscType::Both => vec![vsb(), qam()],
        }
    }
}

/// Satellite sweep: each listed transponder is a group of its own.
pub fn satellite_groups(transponders: &[SatelliteParams]) -> Vec<SweepGroup> {
    transponders
        .iter()
        .map(|&p| vec![FrontendParameters::Satellite(p)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dvbt_europe_frequencies() {
        let list = ChannelPlan::DvbtEurope.channel_list(false);
        let find = |n| list.channels.iter().find(|c| c.number == n).unwrap();
        assert_eq!(find(5).frequency, 177_500_000);
        assert_eq!(find(12).frequency, 226_500_000);
        assert_eq!(find(21).frequency, 474_000_000);
        assert_eq!(find(69).frequency, 858_000_000);
        assert_eq!(find(21).bandwidth, Bandwidth::Mhz8);
        assert_eq!(list.offsets, vec![0]);
        assert_eq!(ChannelPlan::DvbtEurope.channel_list(true).offsets.len(), 3);
    }

    #[test]
    fn test_dvbc_europe_bounds() {
        let list = ChannelPlan::DvbcEurope.channel_list(true);
        assert_eq!(list.channels.first().unwrap().frequency, 113_000_000);
        assert_eq!(list.channels.last().unwrap().frequency, 857_000_000);
    }

    #[test]
    fn test_us_channels() {
        let vsb = ChannelPlan::AtscVsb.channel_list(false);
        assert_eq!(vsb.channels.len(), 50);
        assert_eq!(vsb.channels[0].frequency, 57_000_000);
        assert_eq!(vsb.channels.last().unwrap().frequency, 695_000_000);
        let qam = ChannelPlan::AtscQam.channel_list(false);
        assert_eq!(qam.channels.len(), 134);
        assert!(qam.channels.iter().any(|c| c.number == 95 && c.frequency == 93_000_000));
    }

    #[test]
    fn test_cable_groups_follow_symbol_rates() {
        let pass = SweepPass {
            modulation: Modulation::Qam64,
            channels: ChannelList::from_frequencies(&[346_000_000], Bandwidth::Mhz7),
            symbol_rates: DVBC_SYMBOL_RATES.to_vec(),
        };
        let groups = pass.groups(FrontendType::Cable, Inversion::Auto);
        assert_eq!(groups.len(), 1);
        // 7 MHz allows 6086000 and below
        assert_eq!(groups[0].len(), 8);
        match groups[0][0] {
            FrontendParameters::Cable(p) => assert_eq!(p.symbol_rate, 6_086_000),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cable_sweep_axes() {
        let default = CableSweep::default();
        assert_eq!(default.modulations(true), vec![Modulation::QamAuto]);
        assert_eq!(default.modulations(false), vec![Modulation::Qam64, Modulation::Qam256]);
        assert_eq!(default.symbol_rates(), vec![6_900_000, 6_875_000]);

        let extended = CableSweep {
            extended: 0x03,
            ..Default::default()
        };
        assert_eq!(extended.modulations(false).len(), 3);
        assert_eq!(extended.symbol_rates().len(), 18);

        let fixed = CableSweep {
            modulation: Some(2),
            symbol_rate: Some(17),
            extended: 0,
        };
        assert_eq!(fixed.modulations(true), vec![Modulation::Qam128]);
        assert_eq!(fixed.symbol_rates(), vec![3_450_000]);
    }

    #[test]
    fn test_plan_names() {
        for plan in ChannelPlan::ALL {
            assert_eq!(ChannelPlan::from_name(plan.name()), Some(plan));
        }
        assert_eq!(ChannelPlan::from_name("nowhere"), None);
    }
}
