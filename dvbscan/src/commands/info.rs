//! `discover`, `lnbs` and `plans`.

use std::path::PathBuf;

use colored::Colorize;
use dvbscan::tuner::lnb::Lnb;
use dvbscan::tuner::{probe_frontends, FrontendCaps, FrontendInfo};
use dvbscan::ChannelPlan;
use dvbscan_si::FrontendType;

const FRONTEND_TYPES: [FrontendType; 4] = [
    FrontendType::Terrestrial,
    FrontendType::Cable,
    FrontendType::Satellite,
    FrontendType::Atsc,
];

fn discover_report(probed: &[(PathBuf, FrontendInfo)]) -> Vec<String> {
    let mut lines: Vec<String> = probed
        .iter()
        .map(|(path, info)| {
            let generation = if info.caps.has(FrontendCaps::MODULATION_2G) {
                ", 2nd generation"
            } else {
                ""
            };
            format!(
                "{}: {} \"{}\"{}, DVB API {}",
                path.display(),
                info.frontend_type,
                info.name,
                generation,
                info.api_version_string()
            )
        })
        .collect();
    for kind in FRONTEND_TYPES {
        let count = probed.iter().filter(|(_, info)| info.frontend_type == kind).count();
        lines.push(format!("{}: {}", kind, count));
    }
    lines
}

pub(crate) fn discover() {
    let probed = probe_frontends();
    if probed.is_empty() {
        eprintln!("{}", "No DVB frontend found.".yellow());
    }
    for line in discover_report(&probed) {
        println!("{}", line);
    }
}

pub(crate) fn lnbs() {
    for lnb in Lnb::known() {
        println!("{:<10} {}", lnb.name.bold(), lnb.description);
    }
}

pub(crate) fn plans() {
    for plan in ChannelPlan::ALL {
        println!("{:<9} {}", plan.name().bold(), plan.description());
    }
}
