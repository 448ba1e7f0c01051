//! VDR `channels.conf`.
//!
//! `name;provider:frequency:parameters:source:symbolrate:vpid+pcr:apids;ac3:tpid:caids:sid:nid:tid:rid`

use std::fmt::Write as _;

use dvbscan_si::{
    Bandwidth, CodeRate, FrontendParameters, GuardInterval, Hierarchy, Inversion, Modulation,
    Polarization, Rolloff, SatSystem, SatelliteParams, TransmissionMode,
};

use super::OutputWriter;
use crate::model::{AudioStream, Service, Transponder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VdrVersion {
    /// 1.6 and older: no ATSC, no DVB-S2.
    V1_6,
    V1_7,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdrWriter {
    pub version: VdrVersion,
    /// Source of satellite channels whose NIT gave no orbital position.
    pub satellite_source: String,
    pub dump_provider: bool,
}

impl VdrWriter {
    pub fn new(version: VdrVersion) -> Self {
        VdrWriter {
            version,
            satellite_source: "S19.2E".into(),
            dump_provider: true,
        }
    }

    fn modulation(&self, modulation: Modulation) -> &'static str {
        match self.version {
            VdrVersion::V1_7 => match modulation {
                Modulation::Qam16 => "16",
                Modulation::Qam32 => "32",
                Modulation::Qam64 => "64",
                Modulation::Qam128 => "128",
                Modulation::Qam256 => "256",
                Modulation::QamAuto => "998",
                Modulation::Qpsk => "2",
                Modulation::Psk8 => "5",
                Modulation::Apsk16 => "6",
                Modulation::Apsk32 => "7",
                Modulation::Vsb8 => "10",
                Modulation::Vsb16 => "11",
            },
            VdrVersion::V1_6 => match modulation {
                Modulation::Qpsk => "0",
                Modulation::Qam16 => "16",
                Modulation::Qam32 => "32",
                Modulation::Qam64 => "64",
                Modulation::Qam128 => "128",
                Modulation::Qam256 => "256",
                _ => "999",
            },
        }
    }

    fn source(&self, p: &SatelliteParams) -> String {
        if p.orbital_position == 0 {
            return self.satellite_source.clone();
        }
        let degrees = p.orbital_position / 10;
        let tenths = p.orbital_position % 10;
        let side = if p.west_east_flag { 'E' } else { 'W' };
        if tenths == 0 {
            format!("S{}{}", degrees, side)
        } else {
            format!("S{}.{}{}", degrees, tenths, side)
        }
    }

    /// `frequency:parameters:source:symbolrate`
    fn parameters(&self, params: &FrontendParameters) -> Option<String> {
        Some(match params {
            FrontendParameters::Terrestrial(p) => format!(
                "{}:I{}B{}C{}D{}M{}T{}G{}Y{}:T:27500",
                p.frequency / 1000,
                inversion(p.inversion),
                bandwidth(p.bandwidth),
                fec(p.code_rate_hp),
                fec(p.code_rate_lp),
                self.modulation(p.constellation),
                transmission_mode(p.transmission_mode),
                guard(p.guard_interval),
                hierarchy(p.hierarchy)
            ),
            FrontendParameters::Cable(p) => format!(
                "{}:M{}:C:{}",
                p.frequency / 1000,
                self.modulation(p.modulation),
                p.symbol_rate / 1000
            ),
            FrontendParameters::Atsc(p) => match self.version {
                VdrVersion::V1_6 => return None,
                VdrVersion::V1_7 => format!(
                    "{}:M{}:A:0",
                    p.frequency / 1000,
                    self.modulation(p.modulation)
                ),
            },
            FrontendParameters::Satellite(p) => {
                let mut s = format!("{}:{}C{}", p.frequency / 1000, polarization(p.polarization), fec(p.fec_inner));
                match (self.version, p.system) {
                    (VdrVersion::V1_6, SatSystem::DvbS2) => return None,
                    (VdrVersion::V1_6, SatSystem::DvbS) => {}
                    (VdrVersion::V1_7, SatSystem::DvbS2) => {
                        let _ = write!(s, "M{}O{}S1", self.modulation(p.modulation), rolloff(p.rolloff));
                    }
                    // DVB-S is always QPSK
                    (VdrVersion::V1_7, SatSystem::DvbS) => s.push_str("M2O0S0"),
                }
                format!("{}:{}:{}", s, self.source(p), p.symbol_rate / 1000)
            }
        })
    }
}

impl Default for VdrWriter {
    fn default() -> Self {
        VdrWriter::new(VdrVersion::V1_7)
    }
}

fn inversion(value: Inversion) -> &'static str {
    match value {
        Inversion::Off => "0",
        Inversion::On => "1",
        Inversion::Auto => "999",
    }
}

fn fec(value: CodeRate) -> &'static str {
    match value {
        CodeRate::None => "0",
        CodeRate::Fec1_2 => "12",
        CodeRate::Fec2_3 => "23",
        CodeRate::Fec3_4 => "34",
        CodeRate::Fec4_5 => "45",
        CodeRate::Fec5_6 => "56",
        CodeRate::Fec6_7 => "67",
        CodeRate::Fec7_8 => "78",
        CodeRate::Fec8_9 => "89",
        CodeRate::Fec3_5 => "35",
        CodeRate::Fec9_10 => "910",
        CodeRate::Auto => "999",
    }
}

fn bandwidth(value: Bandwidth) -> &'static str {
    match value {
        Bandwidth::Mhz8 => "8",
        Bandwidth::Mhz7 => "7",
        Bandwidth::Mhz6 => "6",
        Bandwidth::Mhz5 => "5",
        Bandwidth::Auto => "999",
    }
}

fn transmission_mode(value: TransmissionMode) -> &'static str {
    match value {
        TransmissionMode::Mode2k => "2",
        TransmissionMode::Mode8k => "8",
        TransmissionMode::Mode4k => "4",
        TransmissionMode::Auto => "999",
    }
}

fn guard(value: GuardInterval) -> &'static str {
    match value {
        GuardInterval::Guard1_32 => "32",
        GuardInterval::Guard1_16 => "16",
        GuardInterval::Guard1_8 => "8",
        GuardInterval::Guard1_4 => "4",
        GuardInterval::Auto => "999",
    }
}

fn hierarchy(value: Hierarchy) -> &'static str {
    match value {
        Hierarchy::None => "0",
        Hierarchy::Alpha1 => "1",
        Hierarchy::Alpha2 => "2",
        Hierarchy::Alpha4 => "4",
        Hierarchy::Auto => "999",
    }
}

fn rolloff(value: Rolloff) -> &'static str {
    match value {
        Rolloff::Rolloff20 => "20",
        Rolloff::Rolloff25 => "25",
        Rolloff::Rolloff35 | Rolloff::Auto => "35",
    }
}

fn polarization(value: Polarization) -> char {
    match value {
        Polarization::Horizontal => 'h',
        Polarization::Vertical => 'v',
        Polarization::CircularLeft => 'l',
        Polarization::CircularRight => 'r',
    }
}

fn audio_list(streams: &[AudioStream]) -> String {
    streams
        .iter()
        .map(|a| match &a.language {
            Some(language) => format!("{}={}", a.pid, language),
            None => a.pid.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

impl OutputWriter for VdrWriter {
    fn service(&self, tp: &Transponder, service: &Service) -> Option<String> {
        let parameters = self.parameters(&tp.params)?;
        let mut line = service.name.clone().unwrap_or_default();
        if self.dump_provider {
            line.push(';');
            line.push_str(service.provider_name.as_deref().unwrap_or_default());
        }
        let _ = write!(line, ":{}:{}", parameters, service.video_pid);
        if service.video_pid != 0 && service.pcr_pid != service.video_pid {
            let _ = write!(line, "+{}", service.pcr_pid);
        }

        line.push(':');
        if service.audio.is_empty() {
            line.push('0');
        } else {
            line.push_str(&audio_list(&service.audio));
        }
        if !service.ac3.is_empty() {
            line.push(';');
            line.push_str(&audio_list(&service.ac3));
        }

        let ca_ids = if service.ca_ids.is_empty() {
            "0".to_string()
        } else {
            service
                .ca_ids
                .iter()
                .map(|id| format!("{:x}", id))
                .collect::<Vec<_>>()
                .join(",")
        };
        let network = if tp.transport_stream_id > 0 {
            tp.original_network_id
        } else {
            0
        };
        let _ = write!(
            line,
            ":{}:{}:{}:{}:{}:0",
            service.teletext_pid, ca_ids, service.service_id, network, tp.transport_stream_id
        );
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::dvbt;
    use dvbscan_si::{AtscParams, CableParams};

    fn service() -> Service {
        let mut service = Service::new(0x6d66, 0x0441);
        service.name = Some("Das Erste".into());
        service.provider_name = Some("ARD".into());
        service.video_pid = 101;
        service.pcr_pid = 101;
        service.audio = vec![
            AudioStream {
                pid: 102,
                language: Some("deu".into()),
            },
            AudioStream {
                pid: 103,
                language: Some("mis".into()),
            },
        ];
        service.ac3 = vec![AudioStream {
            pid: 106,
            language: None,
        }];
        service.teletext_pid = 104;
        service
    }

    fn transponder(params: FrontendParameters) -> Transponder {
        let mut tp = Transponder::new(params);
        tp.original_network_id = 0x2114;
        tp.transport_stream_id = 0x0441;
        tp
    }

    #[test]
    fn test_terrestrial_line() {
        let tp = transponder(FrontendParameters::Terrestrial(dvbt(522_000_000)));
        let line = VdrWriter::default().service(&tp, &service()).unwrap();
        assert_eq!(
            line,
            "Das Erste;ARD:522000:I999B8C23D0M64T8G4Y0:T:27500:101:102=deu,103=mis;106:104:0:28006:8468:1089:0"
        );
    }

    #[test]
    fn test_pcr_and_ca_ids() {
        let tp = transponder(FrontendParameters::Cable(CableParams {
            frequency: 346_000_000,
            symbol_rate: 6_900_000,
            modulation: Modulation::Qam256,
            ..Default::default()
        }));
        let mut s = service();
        s.pcr_pid = 0x1FFE;
        s.ca_ids = vec![0x1702, 0x0d05];
        s.audio.truncate(1);
        s.ac3.clear();
        let line = VdrWriter::default().service(&tp, &s).unwrap();
        assert_eq!(line, "Das Erste;ARD:346000:M256:C:6900:101+8190:102=deu:104:1702,d05:28006:8468:1089:0");
    }

    #[test]
    fn test_satellite_source() {
        let params = SatelliteParams {
            frequency: 11_836_000,
            polarization: Polarization::Horizontal,
            symbol_rate: 27_500_000,
            fec_inner: CodeRate::Fec3_4,
            orbital_position: 192,
            west_east_flag: true,
            ..Default::default()
        };
        let tp = transponder(FrontendParameters::Satellite(params));
        let line = VdrWriter::default().service(&tp, &service()).unwrap();
        assert!(line.contains(":11836:hC34M2O0S0:S19.2E:27500:"), "{}", line);

        let s2 = FrontendParameters::Satellite(SatelliteParams {
            system: SatSystem::DvbS2,
            ..params
        });
        assert!(VdrWriter::new(VdrVersion::V1_6)
            .service(&transponder(s2), &service())
            .is_none());
    }

    #[test]
    fn test_atsc_needs_1_7() {
        let tp = transponder(FrontendParameters::Atsc(AtscParams {
            frequency: 57_000_000,
            modulation: Modulation::Vsb8,
            ..Default::default()
        }));
        assert!(VdrWriter::new(VdrVersion::V1_6).service(&tp, &service()).is_none());
        let line = VdrWriter::default().service(&tp, &service()).unwrap();
        assert!(line.starts_with("Das Erste;ARD:57000:M10:A:0:101:"), "{}", line);
    }
}
