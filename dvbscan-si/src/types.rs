//! Tuning parameter vocabulary.
//!
//! The delivery system descriptors decode into these types, and the scanner
//! uses them to program the frontend. Most fields have an `Auto` variant
//! meaning "let the driver decide".

use std::fmt;

/// Delivery system of a frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontendType {
    /// DVB-S/S2 (QPSK frontend).
    Satellite,
    /// DVB-C (QAM frontend).
    Cable,
    /// DVB-T (OFDM frontend).
    Terrestrial,
    /// ATSC (VSB/QAM frontend).
    Atsc,
}

impl FrontendType {
    /// Legacy kernel name of the frontend type.
    pub fn name(self) -> &'static str {
        match self {
            FrontendType::Satellite => "QPSK",
            FrontendType::Cable => "QAM",
            FrontendType::Terrestrial => "OFDM",
            FrontendType::Atsc => "ATSC",
        }
    }
}

impl fmt::Display for FrontendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value that may be the "let the driver decide" wildcard.
pub trait Wildcard {
    fn is_auto(&self) -> bool;
}

/// Text form used by initial tuning data files and progress output.
pub trait Token: Sized + Copy + PartialEq + 'static {
    const TOKENS: &'static [(Self, &'static str)];

    fn token(self) -> &'static str {
        Self::TOKENS
            .iter()
            .find(|(value, _)| *value == self)
            .map(|(_, token)| *token)
            .unwrap_or("AUTO")
    }

    fn from_token(s: &str) -> Option<Self> {
        Self::TOKENS
            .iter()
            .find(|(_, token)| token.eq_ignore_ascii_case(s))
            .map(|(value, _)| *value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Inversion {
    Off,
    On,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodeRate {
    None,
    Fec1_2,
    Fec2_3,
    Fec3_4,
    Fec4_5,
    Fec5_6,
    Fec6_7,
    Fec7_8,
    Fec8_9,
    Fec3_5,
    Fec9_10,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Modulation {
    Qpsk,
    Qam16,
    Qam32,
    Qam64,
    Qam128,
    Qam256,
    #[default]
    QamAuto,
    Vsb8,
    Vsb16,
    Psk8,
    Apsk16,
    Apsk32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Bandwidth {
    Mhz8,
    Mhz7,
    Mhz6,
    Mhz5,
    #[default]
    Auto,
}

impl Bandwidth {
    /// Bandwidth in Hz, 0 for `Auto`.
    pub fn hz(self) -> u32 {
        match self {
            Bandwidth::Mhz8 => 8_000_000,
            Bandwidth::Mhz7 => 7_000_000,
            Bandwidth::Mhz6 => 6_000_000,
            Bandwidth::Mhz5 => 5_000_000,
            Bandwidth::Auto => 0,
        }
    }

    pub fn from_hz(hz: u32) -> Self {
        match hz {
            8_000_000 => Bandwidth::Mhz8,
            7_000_000 => Bandwidth::Mhz7,
            6_000_000 => Bandwidth::Mhz6,
            5_000_000 => Bandwidth::Mhz5,
            _ => Bandwidth::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransmissionMode {
    Mode2k,
    Mode8k,
    Mode4k,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GuardInterval {
    Guard1_32,
    Guard1_16,
    Guard1_8,
    Guard1_4,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Hierarchy {
    None,
    Alpha1,
    Alpha2,
    Alpha4,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Polarization {
    #[default]
    Horizontal,
    Vertical,
    CircularLeft,
    CircularRight,
}

impl Polarization {
    /// Vertical and right-hand circular use the 13V supply.
    pub fn is_13v(self) -> bool {
        matches!(self, Polarization::Vertical | Polarization::CircularRight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rolloff {
    #[default]
    Rolloff35,
    Rolloff25,
    Rolloff20,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SatSystem {
    #[default]
    DvbS,
    DvbS2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Pilot {
    On,
    Off,
    #[default]
    Auto,
}

macro_rules! wildcard {
    ($($ty:ident => $auto:path),* $(,)?) => {
        $(impl Wildcard for $ty {
            fn is_auto(&self) -> bool {
                *self == $auto
            }
        })*
    };
}

wildcard! {
    Inversion => Inversion::Auto,
    CodeRate => CodeRate::Auto,
    Modulation => Modulation::QamAuto,
    Bandwidth => Bandwidth::Auto,
    TransmissionMode => TransmissionMode::Auto,
    GuardInterval => GuardInterval::Auto,
    Hierarchy => Hierarchy::Auto,
    Rolloff => Rolloff::Auto,
    Pilot => Pilot::Auto,
}

impl Token for Inversion {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (Inversion::Off, "OFF"),
        (Inversion::On, "ON"),
        (Inversion::Auto, "AUTO"),
    ];
}

impl Token for CodeRate {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (CodeRate::None, "NONE"),
        (CodeRate::Fec1_2, "1/2"),
        (CodeRate::Fec2_3, "2/3"),
        (CodeRate::Fec3_4, "3/4"),
        (CodeRate::Fec4_5, "4/5"),
        (CodeRate::Fec5_6, "5/6"),
        (CodeRate::Fec6_7, "6/7"),
        (CodeRate::Fec7_8, "7/8"),
        (CodeRate::Fec8_9, "8/9"),
        (CodeRate::Fec3_5, "3/5"),
        (CodeRate::Fec9_10, "9/10"),
        (CodeRate::Auto, "AUTO"),
    ];
}

impl Token for Modulation {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (Modulation::Qpsk, "QPSK"),
        (Modulation::Qam16, "QAM16"),
        (Modulation::Qam32, "QAM32"),
        (Modulation::Qam64, "QAM64"),
        (Modulation::Qam128, "QAM128"),
        (Modulation::Qam256, "QAM256"),
        (Modulation::QamAuto, "AUTO"),
        (Modulation::Vsb8, "8VSB"),
        (Modulation::Vsb16, "16VSB"),
        (Modulation::Psk8, "8PSK"),
        (Modulation::Apsk16, "16APSK"),
        (Modulation::Apsk32, "32APSK"),
    ];
}

impl Token for Bandwidth {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (Bandwidth::Mhz8, "8MHz"),
        (Bandwidth::Mhz7, "7MHz"),
        (Bandwidth::Mhz6, "6MHz"),
        (Bandwidth::Mhz5, "5MHz"),
        (Bandwidth::Auto, "AUTO"),
    ];
}

impl Token for TransmissionMode {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (TransmissionMode::Mode2k, "2k"),
        (TransmissionMode::Mode8k, "8k"),
        (TransmissionMode::Mode4k, "4k"),
        (TransmissionMode::Auto, "AUTO"),
    ];
}

impl Token for GuardInterval {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (GuardInterval::Guard1_32, "1/32"),
        (GuardInterval::Guard1_16, "1/16"),
        (GuardInterval::Guard1_8, "1/8"),
        (GuardInterval::Guard1_4, "1/4"),
        (GuardInterval::Auto, "AUTO"),
    ];
}

impl Token for Hierarchy {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (Hierarchy::None, "NONE"),
        (Hierarchy::Alpha1, "1"),
        (Hierarchy::Alpha2, "2"),
        (Hierarchy::Alpha4, "4"),
        (Hierarchy::Auto, "AUTO"),
    ];
}

impl Token for Polarization {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (Polarization::Horizontal, "H"),
        (Polarization::Vertical, "V"),
        (Polarization::CircularLeft, "L"),
        (Polarization::CircularRight, "R"),
    ];
}

impl Token for Rolloff {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (Rolloff::Rolloff35, "35"),
        (Rolloff::Rolloff25, "25"),
        (Rolloff::Rolloff20, "20"),
        (Rolloff::Auto, "AUTO"),
    ];
}

impl Token for SatSystem {
    const TOKENS: &'static [(Self, &'static str)] =
        &[(SatSystem::DvbS, "S"), (SatSystem::DvbS2, "S2")];
}

impl Token for Pilot {
    const TOKENS: &'static [(Self, &'static str)] = &[
        (Pilot::On, "ON"),
        (Pilot::Off, "OFF"),
        (Pilot::Auto, "AUTO"),
    ];
}

/// DVB-T parameters. Frequency in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerrestrialParams {
    pub frequency: u32,
    pub inversion: Inversion,
    pub bandwidth: Bandwidth,
    pub code_rate_hp: CodeRate,
    pub code_rate_lp: CodeRate,
    pub constellation: Modulation,
    pub transmission_mode: TransmissionMode,
    pub guard_interval: GuardInterval,
    pub hierarchy: Hierarchy,
}

/// DVB-C parameters. Frequency in Hz, symbol rate in symbols/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CableParams {
    pub frequency: u32,
    pub inversion: Inversion,
    pub symbol_rate: u32,
    pub fec_inner: CodeRate,
    pub modulation: Modulation,
}

/// DVB-S/S2 parameters. Frequency in kHz (downlink, before the LNB).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SatelliteParams {
    pub frequency: u32,
    pub inversion: Inversion,
    pub symbol_rate: u32,
    pub fec_inner: CodeRate,
    pub polarization: Polarization,
    pub system: SatSystem,
    pub modulation: Modulation,
    pub rolloff: Rolloff,
    pub pilot: Pilot,
    /// Orbital position in 0.1 degree units.
    pub orbital_position: u16,
    pub west_east_flag: bool,
}

/// ATSC parameters. Frequency in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtscParams {
    pub frequency: u32,
    pub inversion: Inversion,
    pub modulation: Modulation,
}

/// Tuning parameters of one transponder; the variant is the delivery system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendParameters {
    Terrestrial(TerrestrialParams),
    Cable(CableParams),
    Satellite(SatelliteParams),
    Atsc(AtscParams),
}

impl FrontendParameters {
    pub fn frontend_type(&self) -> FrontendType {
        match self {
            FrontendParameters::Terrestrial(_) => FrontendType::Terrestrial,
            FrontendParameters::Cable(_) => FrontendType::Cable,
            FrontendParameters::Satellite(_) => FrontendType::Satellite,
            FrontendParameters::Atsc(_) => FrontendType::Atsc,
        }
    }

    /// Frequency in the unit of the delivery system (kHz satellite, Hz otherwise).
    pub fn frequency(&self) -> u32 {
        match self {
            FrontendParameters::Terrestrial(p) => p.frequency,
            FrontendParameters::Cable(p) => p.frequency,
            FrontendParameters::Satellite(p) => p.frequency,
            FrontendParameters::Atsc(p) => p.frequency,
        }
    }

    pub fn set_frequency(&mut self, frequency: u32) {
        match self {
            FrontendParameters::Terrestrial(p) => p.frequency = frequency,
            FrontendParameters::Cable(p) => p.frequency = frequency,
            FrontendParameters::Satellite(p) => p.frequency = frequency,
            FrontendParameters::Atsc(p) => p.frequency = frequency,
        }
    }

    pub fn inversion(&self) -> Inversion {
        match self {
            FrontendParameters::Terrestrial(p) => p.inversion,
            FrontendParameters::Cable(p) => p.inversion,
            FrontendParameters::Satellite(p) => p.inversion,
            FrontendParameters::Atsc(p) => p.inversion,
        }
    }

    /// Empty parameter set for a delivery system, every field `Auto`.
    pub fn empty(frontend: FrontendType) -> Self {
        match frontend {
            FrontendType::Terrestrial => FrontendParameters::Terrestrial(Default::default()),
            FrontendType::Cable => FrontendParameters::Cable(Default::default()),
            FrontendType::Satellite => FrontendParameters::Satellite(Default::default()),
            FrontendType::Atsc => FrontendParameters::Atsc(Default::default()),
        }
    }
}

impl fmt::Display for FrontendParameters {
    /// Compact one-line summary used in progress output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrontendParameters::Terrestrial(p) => write!(
                f,
                "OFDM f = {} kHz {} {} C{} D{} {} {} {} {}",
                p.frequency / 1000,
                p.bandwidth.token(),
                p.constellation.token(),
                p.code_rate_hp.token(),
                p.code_rate_lp.token(),
                p.transmission_mode.token(),
                p.guard_interval.token(),
                p.hierarchy.token(),
                p.inversion.token(),
            ),
            FrontendParameters::Cable(p) => write!(
                f,
                "{} f = {} kHz S{} C{} {}",
                p.modulation.token(),
                p.frequency / 1000,
                p.symbol_rate / 1000,
                p.fec_inner.token(),
                p.inversion.token(),
            ),
            FrontendParameters::Satellite(p) => write!(
                f,
                "{} f = {} kHz {} SR = {} {} {} RO{}",
                p.system.token(),
                p.frequency,
                p.polarization.token(),
                p.symbol_rate / 1000,
                p.fec_inner.token(),
                p.modulation.token(),
                p.rolloff.token(),
            ),
            FrontendParameters::Atsc(p) => write!(
                f,
                "{} f = {} kHz",
                p.modulation.token(),
                p.frequency / 1000
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lookup() {
        assert_eq!(CodeRate::Fec2_3.token(), "2/3");
        assert_eq!(CodeRate::from_token("9/10"), Some(CodeRate::Fec9_10));
        assert_eq!(Modulation::from_token("qam64"), Some(Modulation::Qam64));
        assert_eq!(Modulation::from_token("8VSB"), Some(Modulation::Vsb8));
        assert_eq!(Hierarchy::from_token("bogus"), None);
        assert_eq!(Polarization::Vertical.token(), "V");
    }

    #[test]
    fn test_wildcard() {
        assert!(Modulation::QamAuto.is_auto());
        assert!(!Modulation::Qam64.is_auto());
        assert!(GuardInterval::default().is_auto());
    }

    #[test]
    fn test_set_frequency() {
        let mut params = FrontendParameters::empty(FrontendType::Cable);
        params.set_frequency(474_000_000);
        assert_eq!(params.frequency(), 474_000_000);
        assert_eq!(params.frontend_type(), FrontendType::Cable);
    }

    #[test]
    fn test_bandwidth_hz() {
        assert_eq!(Bandwidth::from_hz(7_000_000), Bandwidth::Mhz7);
        assert_eq!(Bandwidth::Mhz8.hz(), 8_000_000);
        assert_eq!(Bandwidth::from_hz(1), Bandwidth::Auto);
    }
}
