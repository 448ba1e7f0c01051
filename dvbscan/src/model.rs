//! Transponders and services discovered during a scan.

use dvbscan_si::{FrontendParameters, FrontendType};

/// Upper bound of MPEG/AAC audio streams kept per service.
pub const AUDIO_CHAN_MAX: usize = 32;
/// Upper bound of AC-3 streams kept per service.
pub const AC3_CHAN_MAX: usize = 32;
/// Upper bound of CA system ids kept per service.
pub const CA_SYSTEM_ID_MAX: usize = 32;

/// Scan state of a transponder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanStatus {
    /// Queued, not tuned yet.
    #[default]
    New,
    /// Tuned and scanned for services.
    Scanned,
    /// Every tuning attempt failed.
    TuningFailed,
    /// Not tunable with this frontend (capability or range check).
    Skipped,
}

/// An audio elementary stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStream {
    pub pid: u16,
    pub language: Option<String>,
}

/// One program of a transport stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Service {
    pub service_id: u16,
    pub transport_stream_id: u16,
    pub service_type: u8,
    pub provider_name: Option<String>,
    pub name: Option<String>,
    /// Emphasised part of the name, if the broadcaster marked one.
    pub short_name: Option<String>,
    pub running: u8,
    pub scrambled: bool,
    pub pmt_pid: u16,
    pub pcr_pid: u16,
    pub video_pid: u16,
    pub video_stream_type: u8,
    pub audio: Vec<AudioStream>,
    pub ac3: Vec<AudioStream>,
    pub teletext_pid: u16,
    pub subtitling_pid: u16,
    pub ca_ids: Vec<u16>,
    /// ATSC channel number as `major << 10 | minor`.
    pub channel_number: Option<u32>,
    pub(crate) pmt_requested: bool,
}

/// Why a value could not be added to a bounded list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Added,
    Duplicate,
    Full,
}

fn push_stream(list: &mut Vec<AudioStream>, max: usize, pid: u16, language: Option<String>) -> Push {
    if let Some(existing) = list.iter_mut().find(|a| a.pid == pid) {
        if existing.language.is_none() {
            existing.language = language;
        }
        return Push::Duplicate;
    }
    if list.len() >= max {
        return Push::Full;
    }
    list.push(AudioStream { pid, language });
    Push::Added
}

impl Service {
    pub fn new(service_id: u16, transport_stream_id: u16) -> Self {
        Service {
            service_id,
            transport_stream_id,
            ..Default::default()
        }
    }

    pub fn push_audio(&mut self, pid: u16, language: Option<String>) -> Push {
        push_stream(&mut self.audio, AUDIO_CHAN_MAX, pid, language)
    }

    pub fn push_ac3(&mut self, pid: u16, language: Option<String>) -> Push {
        push_stream(&mut self.ac3, AC3_CHAN_MAX, pid, language)
    }

    pub fn push_ca_id(&mut self, id: u16) -> Push {
        if self.ca_ids.contains(&id) {
            Push::Duplicate
        } else if self.ca_ids.len() >= CA_SYSTEM_ID_MAX {
            Push::Full
        } else {
            self.ca_ids.push(id);
            Push::Added
        }
    }

    pub fn kind(&self) -> ServiceKind {
        ServiceKind::classify(self)
    }
}

/// Output category of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Tv,
    Radio,
    Other,
}

impl ServiceKind {
    fn classify(service: &Service) -> Self {
        if service.video_pid != 0 {
            ServiceKind::Tv
        } else if !service.audio.is_empty() || !service.ac3.is_empty() {
            ServiceKind::Radio
        } else {
            ServiceKind::Other
        }
    }
}

/// A tunable carrier and what was found on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transponder {
    pub params: FrontendParameters,
    pub network_id: u16,
    pub original_network_id: u16,
    pub transport_stream_id: u16,
    pub network_name: Option<String>,
    pub services: Vec<Service>,
    pub status: ScanStatus,
    pub updated_by_nit: bool,
    pub last_tuning_failed: bool,
    /// The network signals alternate frequencies for this multiplex.
    pub other_frequency: bool,
    /// Alternate frequencies still to be tried, consumed from the end.
    pub alternate_frequencies: Vec<u32>,
}

impl Transponder {
    pub fn new(params: FrontendParameters) -> Self {
        Transponder {
            params,
            network_id: 0,
            original_network_id: 0,
            transport_stream_id: 0,
            network_name: None,
            services: Vec::new(),
            status: ScanStatus::New,
            updated_by_nit: false,
            last_tuning_failed: false,
            other_frequency: false,
            alternate_frequencies: Vec::new(),
        }
    }

    pub fn frontend_type(&self) -> FrontendType {
        self.params.frontend_type()
    }

    pub fn frequency(&self) -> u32 {
        self.params.frequency()
    }

    pub fn find_service(&self, service_id: u16) -> Option<&Service> {
        self.services.iter().find(|s| s.service_id == service_id)
    }

    pub fn find_service_mut(&mut self, service_id: u16) -> Option<&mut Service> {
        self.services.iter_mut().find(|s| s.service_id == service_id)
    }

    /// Returns the service with `service_id`, creating it if needed.
    pub fn service_entry(&mut self, service_id: u16) -> &mut Service {
        let index = match self.services.iter().position(|s| s.service_id == service_id) {
            Some(index) => index,
            None => {
                self.services
                    .push(Service::new(service_id, self.transport_stream_id));
                self.services.len() - 1
            }
        };
        &mut self.services[index]
    }

    /// Sets the transport stream id and propagates it to the services.
    pub fn set_transport_stream_id(&mut self, tsid: u16) {
        self.transport_stream_id = tsid;
        for service in &mut self.services {
            service.transport_stream_id = tsid;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transponder() -> Transponder {
        Transponder::new(FrontendParameters::empty(FrontendType::Terrestrial))
    }

    #[test]
    fn test_service_entry_reuses_existing() {
        let mut tp = transponder();
        tp.service_entry(101).pmt_pid = 500;
        tp.service_entry(102);
        assert_eq!(tp.service_entry(101).pmt_pid, 500);
        assert_eq!(tp.services.len(), 2);
    }

    #[test]
    fn test_audio_list_is_bounded() {
        let mut service = Service::new(1, 0);
        for pid in 0..AUDIO_CHAN_MAX as u16 {
            assert_eq!(service.push_audio(0x100 + pid, None), Push::Added);
        }
        assert_eq!(service.push_audio(0x100, Some("eng".into())), Push::Duplicate);
        assert_eq!(service.audio[0].language.as_deref(), Some("eng"));
        assert_eq!(service.push_audio(0x1FF, None), Push::Full);
        assert_eq!(service.audio.len(), AUDIO_CHAN_MAX);
    }

    #[test]
    fn test_ca_ids_deduplicated() {
        let mut service = Service::new(1, 0);
        assert_eq!(service.push_ca_id(0x0B00), Push::Added);
        assert_eq!(service.push_ca_id(0x0B00), Push::Duplicate);
        assert_eq!(service.ca_ids, vec![0x0B00]);
    }

    #[test]
    fn test_tsid_propagates_to_services() {
        let mut tp = transponder();
        tp.service_entry(1);
        tp.set_transport_stream_id(0x0401);
        assert_eq!(tp.services[0].transport_stream_id, 0x0401);
        assert_eq!(tp.service_entry(2).transport_stream_id, 0x0401);
    }

    #[test]
    fn test_service_kind() {
        let mut service = Service::new(1, 0);
        assert_eq!(service.kind(), ServiceKind::Other);
        service.push_ac3(0x34, None);
        assert_eq!(service.kind(), ServiceKind::Radio);
        service.video_pid = 0x31;
        assert_eq!(service.kind(), ServiceKind::Tv);
    }
}
