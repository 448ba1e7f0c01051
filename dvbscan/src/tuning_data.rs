//! Initial tuning data, the line format of the classic `scan` utility.
//!
//! ```text
//! # comment
//! T 474000000 8MHz 2/3 NONE QAM64 8k 1/4 NONE
//! C 346000000 6900000 NONE QAM64
//! S 12188000 H 27500000 3/4
//! S2 11914500 H 27500000 3/4 35 8PSK
//! A 57000000 8VSB
//! ```
//!
//! Satellite frequencies are in kHz, all others in Hz.

use std::path::Path;

use dvbscan_si::{
    AtscParams, Bandwidth, CableParams, CodeRate, FrontendParameters, FrontendType, GuardInterval,
    Hierarchy, Modulation, Polarization, Rolloff, SatSystem, SatelliteParams, TerrestrialParams,
    Token, TransmissionMode,
};
use log::{debug, info, warn};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till1};
use nom::character::complete::{digit1, space0, space1};
use nom::combinator::{all_consuming, map, map_opt, map_res, opt, value};
use nom::sequence::{preceded, terminated, tuple};
use nom::IResult;

use crate::error::ScanError;

/// Transponders read from a tuning data file.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningData {
    pub frontend: FrontendType,
    pub transponders: Vec<FrontendParameters>,
}

fn word(input: &str) -> IResult<&str, &str> {
    preceded(space1, take_till1(|c: char| c.is_whitespace()))(input)
}

fn number(input: &str) -> IResult<&str, u32> {
    preceded(space1, map_res(digit1, |s: &str| s.parse::<u32>()))(input)
}

fn field<T: Token>(input: &str) -> IResult<&str, T> {
    map_opt(word, T::from_token)(input)
}

fn terrestrial(input: &str) -> IResult<&str, FrontendParameters> {
    let body = tuple((
        number,
        field::<Bandwidth>,
        field::<CodeRate>,
        field::<CodeRate>,
        field::<Modulation>,
        field::<TransmissionMode>,
        field::<GuardInterval>,
        field::<Hierarchy>,
    ));
    map(
        preceded(tag("T"), body),
        |(frequency, bandwidth, code_rate_hp, code_rate_lp, constellation, transmission_mode, guard_interval, hierarchy)| {
            FrontendParameters::Terrestrial(TerrestrialParams {
                frequency,
                bandwidth,
                code_rate_hp,
                code_rate_lp,
                constellation,
                transmission_mode,
                guard_interval,
                hierarchy,
                ..Default::default()
            })
        },
    )(input)
}

fn cable(input: &str) -> IResult<&str, FrontendParameters> {
    map(
        preceded(
            tag("C"),
            tuple((number, number, field::<CodeRate>, field::<Modulation>)),
        ),
        |(frequency, symbol_rate, fec_inner, modulation)| {
            FrontendParameters::Cable(CableParams {
                frequency,
                symbol_rate,
                fec_inner,
                modulation,
                ..Default::default()
            })
        },
    )(input)
}

fn satellite(input: &str) -> IResult<&str, FrontendParameters> {
    let system = alt((
        value(SatSystem::DvbS2, tag("S2")),
        value(SatSystem::DvbS, tag("S1")),
        value(SatSystem::DvbS, tag("S")),
    ));
    let body = tuple((
        number,
        field::<Polarization>,
        number,
        field::<CodeRate>,
        opt(tuple((field::<Rolloff>, field::<Modulation>))),
    ));
    map(
        tuple((system, body)),
        |(system, (frequency, polarization, symbol_rate, fec_inner, extra))| {
            let (rolloff, modulation) = extra.unwrap_or((Rolloff::Rolloff35, Modulation::Qpsk));
            FrontendParameters::Satellite(SatelliteParams {
                frequency,
                polarization,
                symbol_rate,
                fec_inner,
                system,
                rolloff,
                modulation,
                ..Default::default()
            })
        },
    )(input)
}

fn atsc(input: &str) -> IResult<&str, FrontendParameters> {
    map(
        preceded(tag("A"), tuple((number, field::<Modulation>))),
        |(frequency, modulation)| {
            FrontendParameters::Atsc(AtscParams {
                frequency,
                modulation,
                ..Default::default()
            })
        },
    )(input)
}

/// Parses one line; `None` for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<FrontendParameters>, String> {
    let content = line.split('#').next().unwrap_or_default().trim();
    if content.is_empty() {
        return Ok(None);
    }
    let mut entry = all_consuming(terminated(alt((terrestrial, cable, satellite, atsc)), space0));
    entry(content)
        .map(|(_, params)| Some(params))
        .map_err(|e| format!("cannot parse \"{}\": {}", content, e))
}

/// Parses a whole file.
///
/// All entries have to share one delivery system.
pub fn parse(text: &str) -> Result<TuningData, ScanError> {
    let mut frontend = None;
    let mut transponders = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let params = parse_line(line).map_err(|message| ScanError::TuningData {
            line: line_number,
            message,
        })?;
        let Some(params) = params else {
            continue;
        };
        match frontend {
            None => frontend = Some(params.frontend_type()),
            Some(kind) if kind != params.frontend_type() => {
                return Err(ScanError::TuningData {
                    line: line_number,
                    message: format!("{} entry in a {} file", params.frontend_type(), kind),
                });
            }
            Some(_) => {}
        }
        debug!("initial transponder: {}", params);
        transponders.push(params);
    }
    let frontend = frontend.ok_or_else(|| ScanError::TuningData {
        line: 0,
        message: "no transponders".into(),
    })?;
    Ok(TuningData {
        frontend,
        transponders,
    })
}

/// Reads a file. When its delivery system is not `requested`, the file wins.
pub fn load(path: &Path, requested: Option<FrontendType>) -> Result<TuningData, ScanError> {
    let text = std::fs::read_to_string(path).map_err(|source| ScanError::DeviceOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let data = parse(&text)?;
    match requested {
        Some(requested) if requested != data.frontend => warn!(
            "{} holds {} transponders, ignoring requested {}",
            path.display(),
            data.frontend,
            requested
        ),
        _ => info!("{}: {} {} transponders", path.display(), data.transponders.len(), data.frontend),
    }
    Ok(data)
}

/// Formats one transponder as a tuning data line.
pub fn format_line(params: &FrontendParameters) -> String {
    match params {
        FrontendParameters::Terrestrial(p) => format!(
            "T {} {} {} {} {} {} {} {}",
            p.frequency,
            p.bandwidth.token(),
            p.code_rate_hp.token(),
            p.code_rate_lp.token(),
            p.constellation.token(),
            p.transmission_mode.token(),
            p.guard_interval.token(),
            p.hierarchy.token()
        ),
        FrontendParameters::Cable(p) => format!(
            "C {} {} {} {}",
            p.frequency,
            p.symbol_rate,
            p.fec_inner.token(),
            p.modulation.token()
        ),
        FrontendParameters::Satellite(p) => match p.system {
            SatSystem::DvbS => format!(
                "S {} {} {} {}",
                p.frequency,
                p.polarization.token(),
                p.symbol_rate,
                p.fec_inner.token()
            ),
            SatSystem::DvbS2 => format!(
                "S2 {} {} {} {} {} {}",
                p.frequency,
                p.polarization.token(),
                p.symbol_rate,
                p.fec_inner.token(),
                p.rolloff.token(),
                p.modulation.token()
            ),
        },
        FrontendParameters::Atsc(p) => format!("A {} {}", p.frequency, p.modulation.token()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_terrestrial() {
        let params = parse_line("T 474000000 8MHz 2/3 NONE QAM64 8k 1/4 NONE").unwrap().unwrap();
        let FrontendParameters::Terrestrial(p) = params else {
            panic!("not terrestrial: {:?}", params);
        };
        assert_eq!(p.frequency, 474_000_000);
        assert_eq!(p.bandwidth, Bandwidth::Mhz8);
        assert_eq!(p.code_rate_hp, CodeRate::Fec2_3);
        assert_eq!(p.code_rate_lp, CodeRate::None);
        assert_eq!(p.constellation, Modulation::Qam64);
        assert_eq!(p.transmission_mode, TransmissionMode::Mode8k);
        assert_eq!(p.guard_interval, GuardInterval::Guard1_4);
        assert_eq!(p.hierarchy, Hierarchy::None);
    }

    #[test]
    fn test_parse_satellite_variants() {
        let FrontendParameters::Satellite(s1) = parse_line("S 12188000 h 27500000 3/4").unwrap().unwrap() else {
            panic!("not satellite");
        };
        assert_eq!(s1.system, SatSystem::DvbS);
        assert_eq!(s1.polarization, Polarization::Horizontal);
        assert_eq!(s1.modulation, Modulation::Qpsk);

        let FrontendParameters::Satellite(s2) =
            parse_line("S2 11914500 V 27500000 3/4 25 8PSK").unwrap().unwrap()
        else {
            panic!("not satellite");
        };
        assert_eq!(s2.system, SatSystem::DvbS2);
        assert_eq!(s2.rolloff, Rolloff::Rolloff25);
        assert_eq!(s2.modulation, Modulation::Psk8);
    }

    #[test]
    fn test_comments_and_blank_lines() {
        assert_eq!(parse_line("# Berlin").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert!(parse_line("A 57000000 8VSB # channel 2").unwrap().is_some());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_line("C 346000000 6900000 NONE").is_err());
        assert!(parse_line("T 474000000 9MHz 2/3 NONE QAM64 8k 1/4 NONE").is_err());
        assert!(parse_line("X 1 2 3").is_err());
        assert!(parse_line("A 57000000 8VSB extra").is_err());
    }

    #[test]
    fn test_parse_file() {
        let text = "# cable\nC 346000000 6900000 NONE QAM64\n\nC 354000000 6900000 NONE QAM256\n";
        let data = parse(text).unwrap();
        assert_eq!(data.frontend, FrontendType::Cable);
        assert_eq!(data.transponders.len(), 2);

        match parse("C 346000000 6900000 NONE QAM64\nA 57000000 8VSB\n") {
            Err(ScanError::TuningData { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse("# nothing\n").is_err());
    }

    #[test]
    fn test_format_parses_back() {
        let lines = [
            "T 474000000 8MHz 2/3 NONE QAM64 8k 1/4 NONE",
            "C 346000000 6900000 NONE QAM256",
            "S 12188000 H 27500000 3/4",
            "S2 11914500 V 27500000 3/4 35 8PSK",
            "A 57000000 8VSB",
        ];
        for line in lines {
            let params = parse_line(line).unwrap().unwrap();
            assert_eq!(format_line(&params), line);
        }
    }
}
