use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dvbscan::config::OutputKind;
use dvbscan::output::VdrVersion;
use dvbscan_si::FrontendType;

#[derive(Debug, Parser)]
#[clap(name = "dvbscan")]
#[clap(about = "dvbscan finds the transponders and services of a DVB-T/C/S/S2 or ATSC frontend.", long_about = None)]
#[clap(version)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// More output. Repeat for more.{n}
    /// The default level shows transponders and signal locks,
    /// `-v` adds filter activity, `-vv` everything.{n}
    /// `RUST_LOG` takes precedence.
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Less output. Repeat for less.
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Configuration file.{n}
    /// If omitted, `dvbscan.toml` in the working directory is used when present.
    #[clap(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// 0 error, 1 warn, 2 info, 3 debug, 4 and up trace.
    pub fn verbosity(&self) -> u8 {
        (2 + self.verbose).saturating_sub(self.quiet)
    }
}

/// Delivery system to scan.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub(crate) enum FrontendKind {
    /// DVB-T
    #[clap(name = "t")]
    Terrestrial,
    /// DVB-C
    #[clap(name = "c")]
    Cable,
    /// DVB-S and DVB-S2
    #[clap(name = "s")]
    Satellite,
    /// ATSC, terrestrial VSB and cable QAM
    #[clap(name = "a")]
    Atsc,
}

impl From<FrontendKind> for FrontendType {
    fn from(kind: FrontendKind) -> Self {
        match kind {
            FrontendKind::Terrestrial => FrontendType::Terrestrial,
            FrontendKind::Cable => FrontendType::Cable,
            FrontendKind::Satellite => FrontendType::Satellite,
            FrontendKind::Atsc => FrontendType::Atsc,
        }
    }
}

/// Channel list format.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// VDR channels.conf
    Vdr,
    /// channels.conf for czap/tzap/szap/azap and xine
    Zap,
    /// Initial tuning data for a later `-I` scan
    TuningData,
}

impl From<OutputFormat> for OutputKind {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Vdr => OutputKind::Vdr,
            OutputFormat::Zap => OutputKind::Zap,
            OutputFormat::TuningData => OutputKind::TuningData,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub(crate) enum VdrFormat {
    /// VDR 1.6 and older
    #[clap(name = "6")]
    V6,
    /// VDR 1.7 and newer
    #[clap(name = "7")]
    V7,
}

impl From<VdrFormat> for VdrVersion {
    fn from(format: VdrFormat) -> Self {
        match format {
            VdrFormat::V6 => VdrVersion::V1_6,
            VdrFormat::V7 => VdrVersion::V1_7,
        }
    }
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Scan for transponders and services.{n}
    /// Without initial tuning data, every channel of the channel plan
    /// is probed until one locks. The NIT of each transponder found
    /// announces further transponders, which are scanned in turn.{n}
    /// The channel list goes to stdout unless `--output-file` is given.
    Scan(ScanArgs),

    /// List the DVB frontends on this machine.
    Discover,

    /// List the known LNB types.
    Lnbs,

    /// List the built-in channel plans.
    Plans,
}

#[derive(Debug, Args)]
pub(crate) struct ScanArgs {
    /// The delivery system to scan.{n}
    /// If omitted, the type of the initial tuning data or of the
    /// first frontend found is used.
    #[clap(short = 'f', long = "frontend-type", value_enum)]
    pub frontend_type: Option<FrontendKind>,

    /// The frontend device.{n}
    /// 1. (full) `-d /dev/dvb/adapter2/frontend0`{n}
    /// 2. (abbr.) `-d "2|0"`{n}
    /// If omitted, the first frontend of the requested type is used.
    #[clap(short, long, value_name = "CANONICAL_PATH")]
    pub device: Option<String>,

    /// Initial tuning data.{n}
    /// Replaces the blind sweep with the transponders listed in the file.
    #[clap(short = 'I', long, value_name = "FILE")]
    pub initial_tuning_data: Option<PathBuf>,

    /// Channel plan of the sweep. See `dvbscan plans`.
    #[clap(long, value_name = "NAME")]
    pub plan: Option<String>,

    /// Also probe the frequency offsets of the channel plan.
    #[clap(long)]
    pub offsets: bool,

    /// Output format.
    #[clap(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// VDR channels.conf version.
    #[clap(long, value_enum)]
    pub vdr_version: Option<VdrFormat>,

    /// Write the channel list to this file instead of stdout.
    #[clap(long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Do not read NIT other.
    #[clap(long)]
    pub no_other_nits: bool,

    /// Do not queue transponders announced in the NIT.
    #[clap(long)]
    pub no_add_frequencies: bool,

    /// Double every section filter timeout.{n}
    /// Useful for networks that send their tables slowly.
    #[clap(long)]
    pub long_timeout: bool,

    /// Lock wait multiplier.{n}
    /// 1 is fast, 3 is slow but finds weak transponders.
    #[clap(short, long, value_parser = clap::value_parser!(u32).range(1..=3))]
    pub tuning_timeout: Option<u32>,

    /// Spectral inversion of the sweep candidates.{n}
    /// 0 off, 1 on, 2 auto.
    #[clap(short, long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub inversion: Option<u8>,

    /// DVB-C modulation.{n}
    /// 0 QAM64, 1 QAM256, 2 QAM128.
    #[clap(short = 'm', long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub dvbc_modulation: Option<u8>,

    /// DVB-C symbol rate index, 0 to 17.
    #[clap(short = 's', long, value_parser = clap::value_parser!(u8).range(0..=17))]
    pub dvbc_symbol_rate: Option<u8>,

    /// DVB-C extended sweep.{n}
    /// Bit 0: every symbol rate. Bit 1: include QAM128.
    #[clap(short = 'e', long, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub dvbc_extended: Option<u8>,

    /// ATSC type.{n}
    /// 1 terrestrial, 2 cable, 3 both.
    #[clap(short = 'A', long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub atsc_type: Option<u8>,

    /// ATSC: ignore the VCT and read the PAT only.
    #[clap(long)]
    pub no_psip: bool,

    /// LNB type. See `dvbscan lnbs`.{n}
    /// A custom LNB is given as `LOW[,HIGH[,SWITCH]]` in MHz.
    #[clap(short, long, value_name = "TYPE")]
    pub lnb: Option<String>,

    /// DiSEqC committed switch position, 0 to 3.
    #[clap(long, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub diseqc: Option<u8>,

    /// DiSEqC uncommitted switch position, 0 to 15.
    #[clap(long, value_parser = clap::value_parser!(u8).range(0..=15))]
    pub uncommitted: Option<u8>,

    /// DiSEqC 1.2 positioner slot holding the satellite.
    #[clap(long, value_name = "POSITION")]
    pub rotor: Option<u8>,

    /// Orbital position of the satellite in degrees, east positive.{n}
    /// Used to estimate how long the positioner needs.
    #[clap(long, value_name = "DEGREES", allow_hyphen_values = true)]
    pub orbital_position: Option<f64>,

    /// Include encrypted services in the channel list.
    #[clap(short = 'E', long)]
    pub encrypted: bool,

    /// Services to list.{n}
    /// Bit 0 TV, bit 1 radio, bit 2 other.
    #[clap(short = 'R', long, value_parser = clap::value_parser!(u8).range(1..=7))]
    pub services: Option<u8>,
}

/// Expands the `"adapter|frontend"` shorthand.
pub(crate) fn device_path(device: &str) -> PathBuf {
    match device.split_once('|') {
        Some((adapter, frontend))
            if adapter.trim().parse::<u8>().is_ok() && frontend.trim().parse::<u8>().is_ok() =>
        {
            PathBuf::from(format!(
                "/dev/dvb/adapter{}/frontend{}",
                adapter.trim(),
                frontend.trim()
            ))
        }
        _ => PathBuf::from(device),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_arguments() {
        let cli = Cli::try_parse_from([
            "dvbscan", "-vv", "scan", "-f", "c", "-m", "1", "-e", "1", "--no-other-nits", "-o", "zap",
        ])
        .unwrap();
        assert_eq!(cli.verbosity(), 4);
        let Commands::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert!(matches!(args.frontend_type, Some(FrontendKind::Cable)));
        assert_eq!(args.dvbc_modulation, Some(1));
        assert!(args.no_other_nits);
        assert!(matches!(args.output, Some(OutputFormat::Zap)));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(Cli::try_parse_from(["dvbscan", "scan", "-t", "4"]).is_err());
        assert!(Cli::try_parse_from(["dvbscan", "scan", "--diseqc", "4"]).is_err());
    }

    #[test]
    fn test_device_path() {
        assert_eq!(device_path("2|0"), PathBuf::from("/dev/dvb/adapter2/frontend0"));
        assert_eq!(
            device_path("/dev/dvb/adapter1/frontend1"),
            PathBuf::from("/dev/dvb/adapter1/frontend1")
        );
    }
}
