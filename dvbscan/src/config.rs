//! Optional TOML configuration.
//!
//! ```toml
//! [device]
//! frontend = "/dev/dvb/adapter0/frontend0"
//!
//! [scan]
//! frontend_type = "s"
//! tuning_timeout = 2
//!
//! [lnb]
//! type = "UNIVERSAL"
//!
//! [diseqc]
//! committed = 1
//!
//! [output]
//! format = "vdr"
//!
//! [[satellite.transponders]]
//! frequency = 12188000
//! polarization = "H"
//! symbol_rate = 27500000
//! ```
//!
//! Every value is optional. Command line options override the file.

use std::path::{Path, PathBuf};

use dvbscan_si::{
    CodeRate, FrontendType, Inversion, Modulation, Pilot, Polarization, Rolloff, SatSystem,
    SatelliteParams, Token,
};
use serde::Deserialize;

use crate::channels::{satellite_groups, AtscType, CableSweep, ChannelPlan, SweepPass};
use crate::error::ScanError;
use crate::output::{DumpFilter, VdrVersion};
use crate::scan::ScanPlan;
use crate::session::ScanOptions;
use crate::tuner::FrontendCaps;
use crate::tuner::diseqc::{Rotor, SwitchConfig};
use crate::tuner::lnb::Lnb;
use crate::tuning::SatelliteSetup;

/// Looked for in the working directory when no file is given.
pub const DEFAULT_CONFIG_FILE: &str = "dvbscan.toml";

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub scan: ScanSection,
    #[serde(default)]
    pub lnb: LnbSection,
    #[serde(default)]
    pub diseqc: DiseqcSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub satellite: SatelliteSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct DeviceSection {
    pub frontend: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ScanSection {
    /// `t`, `c`, `s` or `a`.
    pub frontend_type: Option<String>,
    pub plan: Option<String>,
    pub offsets: Option<bool>,
    pub get_other_nits: Option<bool>,
    pub add_frequencies: Option<bool>,
    pub long_filter_timeout: Option<bool>,
    pub tuning_timeout: Option<u32>,
    /// 0 off, 1 on, 2 auto.
    pub inversion: Option<u8>,
    pub dvbc_modulation: Option<usize>,
    pub dvbc_symbol_rate: Option<usize>,
    pub dvbc_extended: Option<u8>,
    pub atsc_type: Option<u8>,
    pub no_psip: Option<bool>,
    pub initial_tuning_data: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LnbSection {
    #[serde(rename = "type")]
    pub lnb_type: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DiseqcSection {
    pub committed: Option<u8>,
    pub uncommitted: Option<u8>,
    pub rotor_position: Option<u8>,
    /// Degrees, east positive.
    pub orbital_position: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputSection {
    /// `vdr`, `zap` or `tuning-data`.
    pub format: Option<String>,
    /// 6 or 7.
    pub vdr_version: Option<u8>,
    pub include_encrypted: Option<bool>,
    pub tv: Option<bool>,
    pub radio: Option<bool>,
    pub other: Option<bool>,
    pub satellite_source: Option<String>,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SatelliteSection {
    #[serde(default)]
    pub transponders: Vec<SatelliteTransponder>,
}

/// One satellite sweep entry. Frequency in kHz.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SatelliteTransponder {
    pub frequency: u32,
    pub polarization: String,
    pub symbol_rate: u32,
    pub fec: Option<String>,
    /// `S` or `S2`.
    pub system: Option<String>,
    pub modulation: Option<String>,
    pub rolloff: Option<String>,
}

fn token<T: Token>(value: Option<&str>, default: T, what: &str) -> Result<T, ScanError> {
    match value {
        None => Ok(default),
        Some(s) => T::from_token(s).ok_or_else(|| ScanError::Setting(format!("unknown {} \"{}\"", what, s))),
    }
}

impl SatelliteTransponder {
    pub fn to_params(&self) -> Result<SatelliteParams, ScanError> {
        let system = token(self.system.as_deref(), SatSystem::DvbS, "delivery system")?;
        let default_modulation = match system {
            SatSystem::DvbS => Modulation::Qpsk,
            SatSystem::DvbS2 => Modulation::Psk8,
        };
        Ok(SatelliteParams {
            frequency: self.frequency,
            polarization: token(Some(&self.polarization), Polarization::Horizontal, "polarization")?,
            symbol_rate: self.symbol_rate,
            fec_inner: token(self.fec.as_deref(), CodeRate::Auto, "FEC")?,
            system,
            modulation: token(self.modulation.as_deref(), default_modulation, "modulation")?,
            rolloff: token(self.rolloff.as_deref(), Rolloff::Rolloff35, "roll-off")?,
            pilot: Pilot::Auto,
            ..Default::default()
        })
    }
}

/// Reads and parses a configuration file.
pub fn load_config(path: &Path) -> Result<ConfigFile, ScanError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ScanError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    toml::from_str(&contents).map_err(|e| ScanError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Explicit path > `dvbscan.toml` in the working directory > none.
pub fn find_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        default_path.exists().then_some(default_path)
    })
}

pub fn parse_frontend_type(s: &str) -> Result<FrontendType, ScanError> {
    match s.to_ascii_lowercase().as_str() {
        "t" | "dvb-t" | "ofdm" => Ok(FrontendType::Terrestrial),
        "c" | "dvb-c" | "qam" => Ok(FrontendType::Cable),
        "s" | "dvb-s" | "qpsk" => Ok(FrontendType::Satellite),
        "a" | "atsc" => Ok(FrontendType::Atsc),
        other => Err(ScanError::Setting(format!("unknown frontend type \"{}\"", other))),
    }
}

pub fn inversion_from_index(index: u8) -> Result<Inversion, ScanError> {
    match index {
        0 => Ok(Inversion::Off),
        1 => Ok(Inversion::On),
        2 => Ok(Inversion::Auto),
        other => Err(ScanError::Setting(format!("inversion must be 0, 1 or 2, not {}", other))),
    }
}

/// Output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    #[default]
    Vdr,
    Zap,
    TuningData,
}

impl OutputKind {
    pub fn from_name(name: &str) -> Result<Self, ScanError> {
        match name.to_ascii_lowercase().as_str() {
            "vdr" => Ok(OutputKind::Vdr),
            "zap" | "xine" => Ok(OutputKind::Zap),
            "tuning-data" | "initial" => Ok(OutputKind::TuningData),
            other => Err(ScanError::Setting(format!("unknown output format \"{}\"", other))),
        }
    }
}

/// Everything a scan needs, merged from defaults and the configuration file.
/// The command line is applied on top by the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub frontend_type: Option<FrontendType>,
    pub device: Option<PathBuf>,
    pub plan: Option<ChannelPlan>,
    pub offsets: bool,
    pub initial_tuning_data: Option<PathBuf>,
    pub options: ScanOptions,
    pub cable: CableSweep,
    pub atsc_type: AtscType,
    pub satellite: SatelliteSetup,
    pub satellite_transponders: Vec<SatelliteParams>,
    pub output: OutputKind,
    pub vdr_version: VdrVersion,
    pub satellite_source: Option<String>,
    pub filter: DumpFilter,
    pub output_file: Option<PathBuf>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings {
            frontend_type: None,
            device: None,
            plan: None,
            offsets: false,
            initial_tuning_data: None,
            options: ScanOptions::default(),
            cable: CableSweep::default(),
            atsc_type: AtscType::Terrestrial,
            satellite: SatelliteSetup::default(),
            satellite_transponders: Vec::new(),
            output: OutputKind::default(),
            vdr_version: VdrVersion::V1_7,
            satellite_source: None,
            filter: DumpFilter::default(),
            output_file: None,
        }
    }
}

impl ScanSettings {
    pub fn from_config(file: &ConfigFile) -> Result<Self, ScanError> {
        let mut settings = ScanSettings::default();
        let scan = &file.scan;

        settings.device = file.device.frontend.clone();
        settings.frontend_type = scan.frontend_type.as_deref().map(parse_frontend_type).transpose()?;
        if let Some(name) = &scan.plan {
            settings.plan = Some(
                ChannelPlan::from_name(name)
                    .ok_or_else(|| ScanError::Setting(format!("unknown channel plan \"{}\"", name)))?,
            );
        }
        settings.offsets = scan.offsets.unwrap_or(settings.offsets);
        settings.initial_tuning_data = scan.initial_tuning_data.clone();

        let options = &mut settings.options;
        options.get_other_nits = scan.get_other_nits.unwrap_or(options.get_other_nits);
        options.add_frequencies = scan.add_frequencies.unwrap_or(options.add_frequencies);
        options.long_filter_timeout = scan.long_filter_timeout.unwrap_or(options.long_filter_timeout);
        options.no_psip = scan.no_psip.unwrap_or(options.no_psip);
        if let Some(timeout) = scan.tuning_timeout {
            if !(1..=3).contains(&timeout) {
                return Err(ScanError::Setting(format!("tuning_timeout must be 1 to 3, not {}", timeout)));
            }
            options.tuning_timeout = timeout;
        }
        if let Some(index) = scan.inversion {
            options.inversion = inversion_from_index(index)?;
        }

        settings.cable = CableSweep {
            modulation: scan.dvbc_modulation,
            symbol_rate: scan.dvbc_symbol_rate,
            extended: scan.dvbc_extended.unwrap_or(0),
        };
        settings.validate_cable()?;
        if let Some(index) = scan.atsc_type {
            settings.atsc_type = AtscType::from_index(index)
                .ok_or_else(|| ScanError::Setting(format!("atsc_type must be 1, 2 or 3, not {}", index)))?;
        }

        if let Some(name) = &file.lnb.lnb_type {
            settings.satellite.lnb =
                Lnb::parse(name).ok_or_else(|| ScanError::Setting(format!("unknown LNB \"{}\"", name)))?;
        }
        settings.satellite.switch = SwitchConfig {
            committed: file.diseqc.committed,
            uncommitted: file.diseqc.uncommitted,
        };
        if let Some(position) = file.diseqc.rotor_position {
            settings.satellite.rotor = Some(Rotor::new(position, file.diseqc.orbital_position.unwrap_or(0.0)));
        }
        settings.validate_switch()?;
        settings.satellite_transponders = file
            .satellite
            .transponders
            .iter()
            .map(SatelliteTransponder::to_params)
            .collect::<Result<_, _>>()?;

        let output = &file.output;
        if let Some(format) = &output.format {
            settings.output = OutputKind::from_name(format)?;
        }
        settings.vdr_version = match output.vdr_version {
            None | Some(7) => VdrVersion::V1_7,
            Some(6) => VdrVersion::V1_6,
            Some(other) => return Err(ScanError::Setting(format!("vdr_version must be 6 or 7, not {}", other))),
        };
        settings.satellite_source = output.satellite_source.clone();
        settings.output_file = output.file.clone();

        let mut selection = 0;
        for (enabled, default, bit) in [
            (output.tv, true, DumpFilter::TV),
            (output.radio, true, DumpFilter::RADIO),
            (output.other, false, DumpFilter::OTHER),
        ] {
            if enabled.unwrap_or(default) {
                selection |= bit;
            }
        }
        settings.filter = DumpFilter {
            selection,
            include_encrypted: output.include_encrypted.unwrap_or(false),
        };
        Ok(settings)
    }

    /// Sweep points for a blind scan of `frontend`.
    pub fn sweep_plan(&self, frontend: FrontendType, caps: FrontendCaps) -> Result<ScanPlan, ScanError> {
        let passes = match frontend {
            FrontendType::Satellite => {
                if self.satellite_transponders.is_empty() {
                    return Err(ScanError::Setting(
                        "a satellite scan needs [satellite] transponders or initial tuning data".into(),
                    ));
                }
                return Ok(ScanPlan::Sweep(satellite_groups(&self.satellite_transponders)));
            }
            FrontendType::Atsc => self.atsc_type.passes(self.offsets),
            FrontendType::Terrestrial | FrontendType::Cable => {
                let plan = match self.plan {
                    Some(plan) if plan.frontend_type() != frontend => {
                        return Err(ScanError::Setting(format!(
                            "channel plan {} is not a {} plan",
                            plan, frontend
                        )))
                    }
                    Some(plan) => plan,
                    None => ChannelPlan::default_for(frontend)
                        .ok_or_else(|| ScanError::Setting(format!("no channel plan for {}", frontend)))?,
                };
                let channels = plan.channel_list(self.offsets);
                if frontend == FrontendType::Terrestrial {
                    vec![SweepPass {
                        modulation: Modulation::QamAuto,
                        channels,
                        symbol_rates: Vec::new(),
                    }]
                } else {
                    let symbol_rates = self.cable.symbol_rates();
                    self.cable
                        .modulations(caps.has(FrontendCaps::QAM_AUTO))
                        .into_iter()
                        .map(|modulation| SweepPass {
                            modulation,
                            channels: channels.clone(),
                            symbol_rates: symbol_rates.clone(),
                        })
                        .collect()
                }
            }
        };
        Ok(ScanPlan::Sweep(
            passes
                .iter()
                .flat_map(|pass| pass.groups(frontend, self.options.inversion))
                .collect(),
        ))
    }

    pub fn validate_cable(&self) -> Result<(), ScanError> {
        if matches!(self.cable.modulation, Some(m) if m > 2) {
            return Err(ScanError::Setting("DVB-C modulation index must be 0 to 2".into()));
        }
        if matches!(self.cable.symbol_rate, Some(s) if s > 17) {
            return Err(ScanError::Setting("DVB-C symbol rate index must be 0 to 17".into()));
        }
        if self.cable.extended > 3 {
            return Err(ScanError::Setting("DVB-C extended flags must be 0 to 3".into()));
        }
        Ok(())
    }

    pub fn validate_switch(&self) -> Result<(), ScanError> {
        if matches!(self.satellite.switch.committed, Some(p) if p > 3) {
            return Err(ScanError::Setting("committed switch position must be 0 to 3".into()));
        }
        if matches!(self.satellite.switch.uncommitted, Some(p) if p > 15) {
            return Err(ScanError::Setting("uncommitted switch position must be 0 to 15".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[device]
frontend = "/dev/dvb/adapter1/frontend0"

[scan]
frontend_type = "s"
tuning_timeout = 2
get_other_nits = false

[lnb]
type = "UNIVERSAL"

[diseqc]
committed = 2

[output]
format = "zap"
radio = false
include_encrypted = true

[[satellite.transponders]]
frequency = 12188000
polarization = "H"
symbol_rate = 27500000
fec = "3/4"

[[satellite.transponders]]
frequency = 11914500
polarization = "v"
symbol_rate = 27500000
system = "S2"
"#;

    #[test]
    fn test_parse_sample() {
        let file: ConfigFile = toml::from_str(SAMPLE).unwrap();
        let settings = ScanSettings::from_config(&file).unwrap();
        assert_eq!(settings.device, Some(PathBuf::from("/dev/dvb/adapter1/frontend0")));
        assert_eq!(settings.frontend_type, Some(FrontendType::Satellite));
        assert_eq!(settings.options.tuning_timeout, 2);
        assert!(!settings.options.get_other_nits);
        assert!(settings.options.add_frequencies);
        assert_eq!(settings.satellite.switch.committed, Some(2));
        assert_eq!(settings.output, OutputKind::Zap);
        assert_eq!(settings.filter.selection, DumpFilter::TV);
        assert!(settings.filter.include_encrypted);

        assert_eq!(settings.satellite_transponders.len(), 2);
        let first = settings.satellite_transponders[0];
        assert_eq!(first.fec_inner, CodeRate::Fec3_4);
        assert_eq!(first.system, SatSystem::DvbS);
        let second = settings.satellite_transponders[1];
        assert_eq!(second.polarization, Polarization::Vertical);
        assert_eq!(second.system, SatSystem::DvbS2);
        assert_eq!(second.modulation, Modulation::Psk8);
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let file: ConfigFile = toml::from_str("").unwrap();
        let settings = ScanSettings::from_config(&file).unwrap();
        assert_eq!(settings, ScanSettings::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = [
            "[scan]\ntuning_timeout = 4\n",
            "[scan]\ninversion = 3\n",
            "[scan]\ndvbc_symbol_rate = 18\n",
            "[scan]\nplan = \"mars\"\n",
            "[diseqc]\ncommitted = 4\n",
            "[lnb]\ntype = \"NOPE\"\n",
            "[output]\nvdr_version = 5\n",
        ];
        for text in bad {
            let file: ConfigFile = toml::from_str(text).unwrap();
            assert!(ScanSettings::from_config(&file).is_err(), "{}", text);
        }
    }

    #[test]
    fn test_sweep_plans() {
        let mut settings = ScanSettings::default();
        let ScanPlan::Sweep(groups) = settings.sweep_plan(FrontendType::Terrestrial, FrontendCaps::default()).unwrap()
        else {
            panic!("expected a sweep");
        };
        assert!(groups.iter().all(|g| g.len() == 1));
        assert!(groups.iter().any(|g| g[0].frequency() == 474_000_000));

        let ScanPlan::Sweep(qam_auto) = settings
            .sweep_plan(FrontendType::Cable, FrontendCaps(FrontendCaps::QAM_AUTO))
            .unwrap()
        else {
            panic!("expected a sweep");
        };
        let ScanPlan::Sweep(manual) = settings.sweep_plan(FrontendType::Cable, FrontendCaps::default()).unwrap()
        else {
            panic!("expected a sweep");
        };
        assert_eq!(manual.len(), qam_auto.len() * 2);

        assert!(settings.sweep_plan(FrontendType::Satellite, FrontendCaps::default()).is_err());
        settings.plan = Some(ChannelPlan::DvbcEurope);
        assert!(settings.sweep_plan(FrontendType::Terrestrial, FrontendCaps::default()).is_err());
    }

    #[test]
    fn test_frontend_type_names() {
        assert_eq!(parse_frontend_type("T").unwrap(), FrontendType::Terrestrial);
        assert_eq!(parse_frontend_type("atsc").unwrap(), FrontendType::Atsc);
        assert!(parse_frontend_type("x").is_err());
    }
}
