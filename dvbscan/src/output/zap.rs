//! `channels.conf` for czap, tzap, szap, azap and xine.

use dvbscan_si::{
    Bandwidth, CodeRate, FrontendParameters, GuardInterval, Hierarchy, Inversion, Modulation,
    Polarization, TransmissionMode,
};

use super::OutputWriter;
use crate::model::{Service, Transponder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ZapWriter {
    /// DiSEqC positioner slot written to satellite lines, 0 for none.
    pub rotor_position: u8,
}

fn inversion(value: Inversion) -> &'static str {
    match value {
        Inversion::Off => "INVERSION_OFF",
        Inversion::On => "INVERSION_ON",
        Inversion::Auto => "INVERSION_AUTO",
    }
}

fn fec(value: CodeRate) -> &'static str {
    match value {
        CodeRate::None => "FEC_NONE",
        CodeRate::Fec1_2 => "FEC_1_2",
        CodeRate::Fec2_3 => "FEC_2_3",
        CodeRate::Fec3_4 => "FEC_3_4",
        CodeRate::Fec4_5 => "FEC_4_5",
        CodeRate::Fec5_6 => "FEC_5_6",
        CodeRate::Fec6_7 => "FEC_6_7",
        CodeRate::Fec7_8 => "FEC_7_8",
        CodeRate::Fec8_9 => "FEC_8_9",
        CodeRate::Fec3_5 => "FEC_3_5",
        CodeRate::Fec9_10 => "FEC_9_10",
        CodeRate::Auto => "FEC_AUTO",
    }
}

fn modulation(value: Modulation) -> &'static str {
    match value {
        Modulation::Qpsk => "QPSK",
        Modulation::Qam16 => "QAM_16",
        Modulation::Qam32 => "QAM_32",
        Modulation::Qam64 => "QAM_64",
        Modulation::Qam128 => "QAM_128",
        Modulation::Qam256 => "QAM_256",
        Modulation::QamAuto => "QAM_AUTO",
        Modulation::Vsb8 => "8VSB",
        Modulation::Vsb16 => "16VSB",
        Modulation::Psk8 => "PSK_8",
        Modulation::Apsk16 => "APSK_16",
        Modulation::Apsk32 => "APSK_32",
    }
}

fn bandwidth(value: Bandwidth) -> &'static str {
    match value {
        Bandwidth::Mhz8 => "BANDWIDTH_8_MHZ",
        Bandwidth::Mhz7 => "BANDWIDTH_7_MHZ",
        Bandwidth::Mhz6 => "BANDWIDTH_6_MHZ",
        Bandwidth::Mhz5 => "BANDWIDTH_5_MHZ",
        Bandwidth::Auto => "BANDWIDTH_AUTO",
    }
}

fn transmission_mode(value: TransmissionMode) -> &'static str {
    match value {
        TransmissionMode::Mode2k => "TRANSMISSION_MODE_2K",
        TransmissionMode::Mode8k => "TRANSMISSION_MODE_8K",
        TransmissionMode::Mode4k => "TRANSMISSION_MODE_4K",
        TransmissionMode::Auto => "TRANSMISSION_MODE_AUTO",
    }
}

fn guard(value: GuardInterval) -> &'static str {
    match value {
        GuardInterval::Guard1_32 => "GUARD_INTERVAL_1_32",
        GuardInterval::Guard1_16 => "GUARD_INTERVAL_1_16",
        GuardInterval::Guard1_8 => "GUARD_INTERVAL_1_8",
        GuardInterval::Guard1_4 => "GUARD_INTERVAL_1_4",
        GuardInterval::Auto => "GUARD_INTERVAL_AUTO",
    }
}

fn hierarchy(value: Hierarchy) -> &'static str {
    match value {
        Hierarchy::None => "HIERARCHY_NONE",
        Hierarchy::Alpha1 => "HIERARCHY_1",
        Hierarchy::Alpha2 => "HIERARCHY_2",
        Hierarchy::Alpha4 => "HIERARCHY_4",
        Hierarchy::Auto => "HIERARCHY_AUTO",
    }
}

impl ZapWriter {
    fn parameters(&self, params: &FrontendParameters) -> String {
        match params {
            FrontendParameters::Atsc(p) => format!("{}:{}", p.frequency, modulation(p.modulation)),
            FrontendParameters::Cable(p) => format!(
                "{}:{}:{}:{}:{}",
                p.frequency,
                inversion(p.inversion),
                p.symbol_rate,
                fec(p.fec_inner),
                modulation(p.modulation)
            ),
            FrontendParameters::Terrestrial(p) => format!(
                "{}:{}:{}:{}:{}:{}:{}:{}:{}",
                p.frequency,
                inversion(p.inversion),
                bandwidth(p.bandwidth),
                fec(p.code_rate_hp),
                fec(p.code_rate_lp),
                modulation(p.constellation),
                transmission_mode(p.transmission_mode),
                guard(p.guard_interval),
                hierarchy(p.hierarchy)
            ),
            FrontendParameters::Satellite(p) => {
                let polarization = match p.polarization {
                    Polarization::Horizontal => 'h',
                    Polarization::Vertical => 'v',
                    Polarization::CircularLeft => 'l',
                    Polarization::CircularRight => 'r',
                };
                format!(
                    "{}:{}:{}:{}",
                    p.frequency / 1000,
                    polarization,
                    self.rotor_position,
                    p.symbol_rate / 1000
                )
            }
        }
    }
}

impl OutputWriter for ZapWriter {
    fn service(&self, tp: &Transponder, service: &Service) -> Option<String> {
        let audio_pid = service
            .audio
            .first()
            .or_else(|| service.ac3.first())
            .map_or(0, |a| a.pid);
        if service.video_pid == 0 && audio_pid == 0 {
            return None;
        }
        let name = service.name.as_deref().unwrap_or_default();
        let label = match &service.provider_name {
            Some(provider) => format!("{}({})", name, provider),
            None => name.to_string(),
        };
        Some(format!(
            "{}:{}:{}:{}:{}",
            label,
            self.parameters(&tp.params),
            service.video_pid,
            audio_pid,
            service.service_id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AudioStream;
    use crate::testing::fixtures::dvbt;
    use dvbscan_si::SatelliteParams;

    fn radio() -> Service {
        let mut service = Service::new(28419, 1);
        service.name = Some("Radio".into());
        service.ac3 = vec![AudioStream {
            pid: 0x140,
            language: None,
        }];
        service
    }

    #[test]
    fn test_terrestrial_line() {
        let tp = Transponder::new(FrontendParameters::Terrestrial(dvbt(474_000_000)));
        let line = ZapWriter::default().service(&tp, &radio()).unwrap();
        assert_eq!(
            line,
            "Radio:474000000:INVERSION_AUTO:BANDWIDTH_8_MHZ:FEC_2_3:FEC_NONE:QAM_64:TRANSMISSION_MODE_8K:GUARD_INTERVAL_1_4:HIERARCHY_NONE:0:320:28419"
        );
    }

    #[test]
    fn test_satellite_line() {
        let tp = Transponder::new(FrontendParameters::Satellite(SatelliteParams {
            frequency: 12_188_000,
            polarization: Polarization::Vertical,
            symbol_rate: 27_500_000,
            ..Default::default()
        }));
        let mut service = radio();
        service.provider_name = Some("BR".into());
        let line = ZapWriter { rotor_position: 2 }.service(&tp, &service).unwrap();
        assert_eq!(line, "Radio(BR):12188:v:2:27500:0:320:28419");
    }

    #[test]
    fn test_skips_services_without_streams() {
        let tp = Transponder::new(FrontendParameters::Terrestrial(dvbt(474_000_000)));
        let mut service = radio();
        service.ac3.clear();
        assert!(ZapWriter::default().service(&tp, &service).is_none());
    }
}
