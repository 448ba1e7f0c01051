//! Per delivery system rules.
//!
//! Everything that differs between DVB-T, DVB-C, DVB-S/S2 and ATSC is
//! answered here: section repetition rates, the tolerance used to call
//! two carriers the same, which parameters have to match, and the DVB
//! API v5 property sequence that tunes a transponder.

use dvbscan_si::{
    table_id, AtscParams, CableParams, FrontendParameters, FrontendType, Modulation, Rolloff,
    SatSystem, SatelliteParams, TerrestrialParams, Wildcard,
};

use crate::tuner::dtv::{delivery_system, DtvCommand as C, DtvProperty, KernelValue};
use crate::tuner::{FrontendCaps, FrontendInfo};

/// Lowest DVB API version that can tune DVB-S2.
const API_VERSION_S2: u16 = 0x0500;

pub trait DeliverySystem {
    /// Two carriers closer than this are the same transponder.
    ///
    /// kHz for satellite, Hz otherwise.
    fn frequency_tolerance(&self) -> u32;

    /// Nominal repetition period of a table, in seconds.
    fn repetition_rate(&self, table_id: u8) -> u32;

    /// Whether two parameter sets describe different transponders.
    ///
    /// With `allow_auto`, a field that is `Auto` on either side matches
    /// anything. Frequencies are not compared here.
    fn parameters_differ(
        &self,
        a: &FrontendParameters,
        b: &FrontendParameters,
        allow_auto: bool,
    ) -> bool;

    /// Property sequence that tunes `params`, `frequency` being what the
    /// tuner sees (the intermediate frequency for satellite).
    fn tune_properties(&self, params: &FrontendParameters, frequency: u32) -> Vec<DtvProperty>;

    /// Checks `params` against what the frontend reports it can do.
    ///
    /// Returns the reason when the transponder cannot be tuned.
    fn check_capabilities(
        &self,
        params: &FrontendParameters,
        frequency: u32,
        info: &FrontendInfo,
    ) -> Result<(), String>;
}

fn differs<T: PartialEq + Wildcard>(a: T, b: T, allow_auto: bool) -> bool {
    a != b && !(allow_auto && (a.is_auto() || b.is_auto()))
}

fn terrestrial_differ(a: &TerrestrialParams, b: &TerrestrialParams, allow_auto: bool) -> bool {
    differs(a.constellation, b.constellation, allow_auto)
        || differs(a.bandwidth, b.bandwidth, allow_auto)
        || differs(a.code_rate_hp, b.code_rate_hp, allow_auto)
        || differs(a.hierarchy, b.hierarchy, allow_auto)
        || differs(a.code_rate_lp, b.code_rate_lp, allow_auto)
        || differs(a.transmission_mode, b.transmission_mode, allow_auto)
        || differs(a.guard_interval, b.guard_interval, allow_auto)
}

fn cable_differ(a: &CableParams, b: &CableParams, allow_auto: bool) -> bool {
    differs(a.modulation, b.modulation, allow_auto)
        || a.symbol_rate != b.symbol_rate
        || differs(a.fec_inner, b.fec_inner, allow_auto)
}

fn satellite_differ(a: &SatelliteParams, b: &SatelliteParams, allow_auto: bool) -> bool {
    a.polarization != b.polarization
        || a.symbol_rate != b.symbol_rate
        || a.system != b.system
        || differs(a.fec_inner, b.fec_inner, allow_auto)
        || differs(a.rolloff, b.rolloff, allow_auto)
        || differs(a.modulation, b.modulation, allow_auto)
}

fn atsc_differ(a: &AtscParams, b: &AtscParams, allow_auto: bool) -> bool {
    differs(a.modulation, b.modulation, allow_auto)
}

fn out_of_range(value: u32, min: u32, max: u32) -> bool {
    // drivers that report 0 as maximum do not restrict the range
    max != 0 && (value < min || value > max)
}

impl DeliverySystem for FrontendType {
    fn frequency_tolerance(&self) -> u32 {
        match self {
            FrontendType::Satellite => 2_000,
            _ => 500_000,
        }
    }

    fn repetition_rate(&self, table: u8) -> u32 {
        let group = match table {
            table_id::PAT | table_id::CAT | table_id::PMT | table_id::TSDT => Rate::Psi,
            table_id::SDT_ACTUAL | table_id::EIT_ACTUAL => Rate::Actual,
            table_id::NIT_ACTUAL | table_id::NIT_OTHER | table_id::BAT | table_id::SDT_OTHER => {
                Rate::Network
            }
            table_id::EIT_OTHER => Rate::EitOther,
            _ => Rate::Other,
        };
        match (self, group) {
            (_, Rate::Psi) => 1,
            (FrontendType::Atsc, _) => 5,
            (_, Rate::Actual) => 2,
            (FrontendType::Terrestrial, Rate::Network) => 12,
            (FrontendType::Terrestrial, Rate::EitOther) => 20,
            (_, Rate::Network | Rate::EitOther) => 10,
            (_, Rate::Other) => 30,
        }
    }

    fn parameters_differ(
        &self,
        a: &FrontendParameters,
        b: &FrontendParameters,
        allow_auto: bool,
    ) -> bool {
        match (a, b) {
            (FrontendParameters::Terrestrial(a), FrontendParameters::Terrestrial(b)) => {
                terrestrial_differ(a, b, allow_auto)
            }
            (FrontendParameters::Cable(a), FrontendParameters::Cable(b)) => {
                cable_differ(a, b, allow_auto)
            }
            (FrontendParameters::Satellite(a), FrontendParameters::Satellite(b)) => {
                satellite_differ(a, b, allow_auto)
            }
            (FrontendParameters::Atsc(a), FrontendParameters::Atsc(b)) => {
                atsc_differ(a, b, allow_auto)
            }
            _ => true,
        }
    }

    fn tune_properties(&self, params: &FrontendParameters, frequency: u32) -> Vec<DtvProperty> {
        let mut props = vec![DtvProperty::new(C::Clear, 0)];
        match params {
            FrontendParameters::Terrestrial(p) => props.extend([
                DtvProperty::new(C::DeliverySystem, delivery_system::DVBT),
                DtvProperty::new(C::Frequency, frequency),
                DtvProperty::new(C::Inversion, p.inversion.kernel_value()),
                DtvProperty::new(C::BandwidthHz, p.bandwidth.hz()),
                DtvProperty::new(C::CodeRateHp, p.code_rate_hp.kernel_value()),
                DtvProperty::new(C::CodeRateLp, p.code_rate_lp.kernel_value()),
                DtvProperty::new(C::Modulation, p.constellation.kernel_value()),
                DtvProperty::new(C::TransmissionMode, p.transmission_mode.kernel_value()),
                DtvProperty::new(C::GuardInterval, p.guard_interval.kernel_value()),
                DtvProperty::new(C::Hierarchy, p.hierarchy.kernel_value()),
            ]),
            FrontendParameters::Cable(p) => props.extend([
                DtvProperty::new(C::DeliverySystem, delivery_system::DVBC_ANNEX_A),
                DtvProperty::new(C::Frequency, frequency),
                DtvProperty::new(C::Inversion, p.inversion.kernel_value()),
                DtvProperty::new(C::SymbolRate, p.symbol_rate),
                DtvProperty::new(C::InnerFec, p.fec_inner.kernel_value()),
                DtvProperty::new(C::Modulation, p.modulation.kernel_value()),
            ]),
            FrontendParameters::Satellite(p) => {
                let s2 = p.system == SatSystem::DvbS2;
                let modulation = if s2 { p.modulation } else { Modulation::Qpsk };
                props.extend([
                    DtvProperty::new(
                        C::DeliverySystem,
                        if s2 { delivery_system::DVBS2 } else { delivery_system::DVBS },
                    ),
                    DtvProperty::new(C::Frequency, frequency),
                    DtvProperty::new(C::Inversion, p.inversion.kernel_value()),
                    DtvProperty::new(C::SymbolRate, p.symbol_rate),
                    DtvProperty::new(C::InnerFec, p.fec_inner.kernel_value()),
                    DtvProperty::new(C::Modulation, modulation.kernel_value()),
                ]);
                if s2 {
                    props.push(DtvProperty::new(C::Pilot, p.pilot.kernel_value()));
                    props.push(DtvProperty::new(C::Rolloff, p.rolloff.kernel_value()));
                } else {
                    props.push(DtvProperty::new(C::Rolloff, Rolloff::Rolloff35.kernel_value()));
                }
            }
            FrontendParameters::Atsc(p) => {
                let system = match p.modulation {
                    Modulation::Vsb8 | Modulation::Vsb16 => delivery_system::ATSC,
                    _ => delivery_system::DVBC_ANNEX_B,
                };
                props.extend([
                    DtvProperty::new(C::DeliverySystem, system),
                    DtvProperty::new(C::Frequency, frequency),
                    DtvProperty::new(C::Inversion, p.inversion.kernel_value()),
                    DtvProperty::new(C::Modulation, p.modulation.kernel_value()),
                ]);
            }
        }
        props.push(DtvProperty::new(C::Tune, 0));
        props
    }

    fn check_capabilities(
        &self,
        params: &FrontendParameters,
        frequency: u32,
        info: &FrontendInfo,
    ) -> Result<(), String> {
        let symbol_rate = match params {
            FrontendParameters::Satellite(p) => {
                if p.system == SatSystem::DvbS2
                    && (!info.caps.has(FrontendCaps::MODULATION_2G)
                        || info.api_version < API_VERSION_S2)
                {
                    return Err("DVB-S2 is not supported by this frontend".to_string());
                }
                Some(p.symbol_rate)
            }
            FrontendParameters::Cable(p) => Some(p.symbol_rate),
            FrontendParameters::Atsc(p) => {
                let needed = match p.modulation {
                    Modulation::Vsb8 => FrontendCaps::VSB_8,
                    Modulation::Vsb16 => FrontendCaps::VSB_16,
                    _ => 0,
                };
                if needed != 0 && !info.caps.has(needed) {
                    return Err(format!("{:?} is not supported by this frontend", p.modulation));
                }
                None
            }
            FrontendParameters::Terrestrial(_) => None,
        };

        if let Some(rate) = symbol_rate {
            if out_of_range(rate, info.symbol_rate_min, info.symbol_rate_max) {
                return Err(format!(
                    "symbol rate {} outside of {}..{}",
                    rate, info.symbol_rate_min, info.symbol_rate_max
                ));
            }
        }
        if out_of_range(frequency, info.frequency_min, info.frequency_max) {
            return Err(format!(
                "frequency {} outside of {}..{}",
                frequency, info.frequency_min, info.frequency_max
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Rate {
    Psi,
    Actual,
    Network,
    EitOther,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuner::dtv::DtvCommand;
    use dvbscan_si::{Bandwidth, GuardInterval};

    fn info(frontend_type: FrontendType) -> FrontendInfo {
        FrontendInfo {
            name: "mock".into(),
            frontend_type,
            frequency_min: 950_000,
            frequency_max: 2_150_000,
            frequency_stepsize: 0,
            symbol_rate_min: 1_000_000,
            symbol_rate_max: 45_000_000,
            caps: FrontendCaps(0),
            api_version: 0x0505,
        }
    }

    #[test]
    fn test_repetition_rates() {
        let t = FrontendType::Terrestrial;
        assert_eq!(t.repetition_rate(table_id::PAT), 1);
        assert_eq!(t.repetition_rate(table_id::SDT_ACTUAL), 2);
        assert_eq!(t.repetition_rate(table_id::NIT_ACTUAL), 12);
        assert_eq!(t.repetition_rate(table_id::EIT_OTHER), 20);
        assert_eq!(t.repetition_rate(table_id::TDT), 30);

        let c = FrontendType::Cable;
        assert_eq!(c.repetition_rate(table_id::NIT_OTHER), 10);
        assert_eq!(c.repetition_rate(table_id::EIT_OTHER), 10);
        assert_eq!(FrontendType::Satellite.repetition_rate(table_id::TOT), 30);

        let a = FrontendType::Atsc;
        assert_eq!(a.repetition_rate(table_id::PMT), 1);
        assert_eq!(a.repetition_rate(table_id::TVCT), 5);
        assert_eq!(a.repetition_rate(table_id::SDT_ACTUAL), 5);
    }

    #[test]
    fn test_auto_matches_anything() {
        let t = FrontendType::Terrestrial;
        let auto = FrontendParameters::empty(t);
        let concrete = FrontendParameters::Terrestrial(TerrestrialParams {
            bandwidth: Bandwidth::Mhz8,
            constellation: Modulation::Qam64,
            guard_interval: GuardInterval::Guard1_4,
            ..Default::default()
        });
        assert!(!t.parameters_differ(&auto, &concrete, true));
        assert!(t.parameters_differ(&auto, &concrete, false));
        assert!(!t.parameters_differ(&concrete, &concrete, false));
    }

    #[test]
    fn test_symbol_rate_is_strict() {
        let c = FrontendType::Cable;
        let a = FrontendParameters::Cable(CableParams {
            symbol_rate: 6_900_000,
            ..Default::default()
        });
        let b = FrontendParameters::Cable(CableParams {
            symbol_rate: 6_875_000,
            ..Default::default()
        });
        assert!(c.parameters_differ(&a, &b, true));
        assert!(c.parameters_differ(&a, &FrontendParameters::empty(FrontendType::Atsc), true));
    }

    #[test]
    fn test_terrestrial_properties() {
        let params = FrontendParameters::Terrestrial(TerrestrialParams {
            frequency: 474_000_000,
            bandwidth: Bandwidth::Mhz8,
            ..Default::default()
        });
        let props = FrontendType::Terrestrial.tune_properties(&params, 474_000_000);
        assert_eq!(props.first().map(|p| p.cmd), Some(DtvCommand::Clear));
        assert_eq!(props.last().map(|p| p.cmd), Some(DtvCommand::Tune));
        assert!(props.contains(&DtvProperty::new(DtvCommand::DeliverySystem, delivery_system::DVBT)));
        assert!(props.contains(&DtvProperty::new(DtvCommand::BandwidthHz, 8_000_000)));
        assert!(props.contains(&DtvProperty::new(DtvCommand::Frequency, 474_000_000)));
    }

    #[test]
    fn test_satellite_dvbs_forces_qpsk() {
        let params = FrontendParameters::Satellite(SatelliteParams {
            frequency: 11_362_000,
            symbol_rate: 22_000_000,
            modulation: Modulation::Psk8,
            ..Default::default()
        });
        let props = FrontendType::Satellite.tune_properties(&params, 1_612_000);
        assert!(props.contains(&DtvProperty::new(DtvCommand::Modulation, 0)));
        assert!(props.contains(&DtvProperty::new(DtvCommand::Frequency, 1_612_000)));
    }

    #[test]
    fn test_s2_needs_capability() {
        let s = FrontendType::Satellite;
        let params = FrontendParameters::Satellite(SatelliteParams {
            frequency: 11_362_000,
            symbol_rate: 22_000_000,
            system: SatSystem::DvbS2,
            ..Default::default()
        });
        let mut fe = info(s);
        assert!(s.check_capabilities(&params, 1_612_000, &fe).is_err());
        fe.caps = FrontendCaps(FrontendCaps::MODULATION_2G);
        assert!(s.check_capabilities(&params, 1_612_000, &fe).is_ok());
        fe.api_version = 0x0302;
        assert!(s.check_capabilities(&params, 1_612_000, &fe).is_err());
    }

    #[test]
    fn test_frequency_range() {
        let s = FrontendType::Satellite;
        let params = FrontendParameters::Satellite(SatelliteParams {
            symbol_rate: 22_000_000,
            ..Default::default()
        });
        let fe = info(s);
        assert!(s.check_capabilities(&params, 2_200_000, &fe).is_err());
        assert!(s.check_capabilities(&params, 1_200_000, &fe).is_ok());
    }
}
