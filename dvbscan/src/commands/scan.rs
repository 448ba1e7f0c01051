//! The `scan` subcommand.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use colored::Colorize;
use log::{info, warn};

use dvbscan::config::{self, inversion_from_index, ConfigFile, OutputKind, ScanSettings};
use dvbscan::output::{dump_lists, OutputWriter, TuningDataWriter, VdrWriter, ZapWriter};
use dvbscan::tuner::diseqc::Rotor;
use dvbscan::tuner::lnb::Lnb;
use dvbscan::tuner::{probe_frontends, select_frontend, Frontend, FrontendCaps, LinuxDemux, LinuxFrontend};
use dvbscan::{tuning_data, Pacing, ScanEnd, ScanError, ScanPlan, ScanSession, ScanStatus, Scanner, Tuner};
use dvbscan_si::FrontendType;

use crate::context::{device_path, ScanArgs};

/// Reads the configuration file, if any.
fn read_config(explicit: Option<PathBuf>) -> Result<ConfigFile, ScanError> {
    match config::find_config(explicit) {
        Some(path) => {
            let file = config::load_config(&path)?;
            eprintln!("Loaded config from: {}", path.display());
            Ok(file)
        }
        None => Ok(ConfigFile::default()),
    }
}

/// Lays the command line over the settings from the configuration file.
fn apply_args(settings: &mut ScanSettings, args: &ScanArgs) -> Result<(), ScanError> {
    if let Some(kind) = args.frontend_type {
        settings.frontend_type = Some(kind.into());
    }
    if let Some(device) = &args.device {
        settings.device = Some(device_path(device));
    }
    if let Some(path) = &args.initial_tuning_data {
        settings.initial_tuning_data = Some(path.clone());
    }
    if let Some(name) = &args.plan {
        settings.plan = Some(
            dvbscan::ChannelPlan::from_name(name)
                .ok_or_else(|| ScanError::Setting(format!("unknown channel plan \"{}\"", name)))?,
        );
    }
    settings.offsets |= args.offsets;

    let options = &mut settings.options;
    options.get_other_nits &= !args.no_other_nits;
    options.add_frequencies &= !args.no_add_frequencies;
    options.long_filter_timeout |= args.long_timeout;
    options.no_psip |= args.no_psip;
    if let Some(timeout) = args.tuning_timeout {
        options.tuning_timeout = timeout;
    }
    if let Some(index) = args.inversion {
        options.inversion = inversion_from_index(index)?;
    }

    if let Some(index) = args.dvbc_modulation {
        settings.cable.modulation = Some(usize::from(index));
    }
    if let Some(index) = args.dvbc_symbol_rate {
        settings.cable.symbol_rate = Some(usize::from(index));
    }
    if let Some(flags) = args.dvbc_extended {
        settings.cable.extended = flags;
    }
    if let Some(index) = args.atsc_type {
        settings.atsc_type = dvbscan::AtscType::from_index(index)
            .ok_or_else(|| ScanError::Setting(format!("atsc type must be 1, 2 or 3, not {}", index)))?;
    }

    let satellite = &mut settings.satellite;
    if let Some(name) = &args.lnb {
        satellite.lnb = Lnb::parse(name).ok_or_else(|| ScanError::Setting(format!("unknown LNB \"{}\"", name)))?;
    }
    if args.diseqc.is_some() {
        satellite.switch.committed = args.diseqc;
    }
    if args.uncommitted.is_some() {
        satellite.switch.uncommitted = args.uncommitted;
    }
    if let Some(position) = args.rotor {
        let orbital = args
            .orbital_position
            .or(satellite.rotor.map(|r| r.orbital_position))
            .unwrap_or(0.0);
        satellite.rotor = Some(Rotor::new(position, orbital));
    }

    if let Some(format) = args.output {
        settings.output = format.into();
    }
    if let Some(version) = args.vdr_version {
        settings.vdr_version = version.into();
    }
    if let Some(path) = &args.output_file {
        settings.output_file = Some(path.clone());
    }
    settings.filter.include_encrypted |= args.encrypted;
    if let Some(selection) = args.services {
        settings.filter.selection = selection;
    }

    settings.validate_cable()?;
    settings.validate_switch()
}

/// Opens the frontend to scan with and returns its path and type.
fn open_frontend(
    device: Option<&Path>,
    wanted: Option<FrontendType>,
) -> Result<(PathBuf, LinuxFrontend), ScanError> {
    let path = match device {
        Some(path) => path.to_path_buf(),
        None => {
            let probed = probe_frontends();
            let wanted = match wanted {
                Some(wanted) => wanted,
                None => probed
                    .first()
                    .map(|(_, info)| info.frontend_type)
                    .ok_or(ScanError::NoFrontend(FrontendType::Terrestrial))?,
            };
            select_frontend(probed, wanted).ok_or(ScanError::NoFrontend(wanted))?.0
        }
    };
    let frontend = LinuxFrontend::open(&path).map_err(|source| ScanError::DeviceOpen {
        path: path.clone(),
        source,
    })?;
    let found = frontend.info().frontend_type;
    if let Some(wanted) = wanted {
        if found != wanted {
            return Err(ScanError::FrontendMismatch { found, wanted });
        }
    }
    Ok((path, frontend))
}

fn writer(settings: &ScanSettings) -> Box<dyn OutputWriter> {
    match settings.output {
        OutputKind::Vdr => {
            let mut writer = VdrWriter::new(settings.vdr_version);
            if let Some(source) = &settings.satellite_source {
                writer.satellite_source = source.clone();
            }
            Box::new(writer)
        }
        OutputKind::Zap => Box::new(ZapWriter {
            rotor_position: settings.satellite.rotor.map_or(0, |r| r.position),
        }),
        OutputKind::TuningData => Box::new(TuningDataWriter),
    }
}

fn print_summary(session: &ScanSession, listed: usize) {
    let count = |status: ScanStatus| session.scanned().filter(|tp| tp.status == status).count();
    let scanned = count(ScanStatus::Scanned);
    let failed = count(ScanStatus::TuningFailed);
    eprintln!(
        "{} transponders scanned, {} services listed",
        scanned.to_string().green().bold(),
        listed.to_string().green().bold()
    );
    if failed > 0 {
        eprintln!("{} transponders failed to tune", failed.to_string().yellow().bold());
    }
}

/// Runs a scan and writes the channel list, partial results included.
pub(crate) fn run(
    args: ScanArgs,
    config_path: Option<PathBuf>,
    interrupted: Arc<AtomicBool>,
) -> Result<ScanEnd, ScanError> {
    let file = read_config(config_path)?;
    let mut settings = ScanSettings::from_config(&file)?;
    apply_args(&mut settings, &args)?;

    let initial = settings
        .initial_tuning_data
        .as_deref()
        .map(|path| tuning_data::load(path, settings.frontend_type))
        .transpose()?;
    let wanted = initial.as_ref().map(|data| data.frontend).or(settings.frontend_type);

    let (path, frontend) = open_frontend(settings.device.as_deref(), wanted)?;
    let info = frontend.info().clone();
    info!(
        "using {} \"{}\", DVB API {}",
        path.display(),
        info.name,
        info.api_version_string()
    );
    if info.frontend_type == FrontendType::Satellite && !info.caps.has(FrontendCaps::MODULATION_2G) {
        warn!("{} cannot tune DVB-S2, those transponders are skipped", info.name);
    }

    let plan = match initial {
        Some(data) => ScanPlan::Replay(data.transponders),
        None => settings.sweep_plan(info.frontend_type, info.caps)?,
    };

    let session = ScanSession::new(info.frontend_type, settings.options);
    let tuner = Tuner::new(
        frontend,
        settings.satellite.clone(),
        settings.options.tuning_timeout,
        Pacing::default(),
    );
    let demux = LinuxDemux::new(LinuxDemux::path_for(&path));
    let mut scanner = Scanner::new(session, tuner, demux, interrupted);
    let result = scanner.run(plan);
    let session = scanner.into_session();

    let writer = writer(&settings);
    let listed = match &settings.output_file {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            dump_lists(&session, writer.as_ref(), &settings.filter, &mut out)?
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let listed = dump_lists(&session, writer.as_ref(), &settings.filter, &mut out)?;
            out.flush()?;
            listed
        }
    };
    print_summary(&session, listed);
    result
}
