//! Channel list writers.
//!
//! [`dump_lists`] walks the scanned transponders in scan order, filters
//! their services and hands each one to an [`OutputWriter`]. Writers that
//! list transponders rather than services get each transponder instead.

mod tuning_data;
mod vdr;
mod zap;

use std::io::{self, Write};

use chrono::Local;
use dvbscan_si::FrontendType;
use log::info;

use crate::model::{ScanStatus, Service, ServiceKind, Transponder};
use crate::session::ScanSession;

pub use self::tuning_data::TuningDataWriter;
pub use self::vdr::{VdrVersion, VdrWriter};
pub use self::zap::ZapWriter;

/// Renders one output format.
pub trait OutputWriter {
    /// Lines written before anything else.
    fn header(&self, _frontend: FrontendType) -> Option<String> {
        None
    }

    /// Called for every scanned transponder, before its services.
    fn transponder(&self, _tp: &Transponder) -> Option<String> {
        None
    }

    /// `service` has a name and no `:` in it.
    fn service(&self, _tp: &Transponder, _service: &Service) -> Option<String> {
        None
    }
}

/// Which services make it into the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpFilter {
    /// Bit 0 TV, bit 1 radio, bit 2 other.
    pub selection: u8,
    pub include_encrypted: bool,
}

impl DumpFilter {
    pub const TV: u8 = 0x01;
    pub const RADIO: u8 = 0x02;
    pub const OTHER: u8 = 0x04;

    pub fn accepts(&self, service: &Service) -> bool {
        let bit = match service.kind() {
            ServiceKind::Tv => Self::TV,
            ServiceKind::Radio => Self::RADIO,
            ServiceKind::Other => Self::OTHER,
        };
        self.selection & bit != 0 && (self.include_encrypted || !service.scrambled)
    }
}

impl Default for DumpFilter {
    fn default() -> Self {
        DumpFilter {
            selection: Self::TV | Self::RADIO,
            include_encrypted: false,
        }
    }
}

/// Copy of `service` as the writers want it.
fn presentable(service: &Service) -> Service {
    let mut service = service.clone();
    let name = service
        .name
        .take()
        .unwrap_or_else(|| format!("service_id {}", service.service_id));
    service.name = Some(name.replace(':', " "));
    service.provider_name = service.provider_name.map(|p| p.replace(':', " "));
    service
}

/// Writes the channel list of a session to `out`.
///
/// Returns the number of services that passed the filter.
pub fn dump_lists(
    session: &ScanSession,
    writer: &dyn OutputWriter,
    filter: &DumpFilter,
    out: &mut dyn Write,
) -> io::Result<usize> {
    let count = session
        .scanned()
        .flat_map(|tp| tp.services.iter())
        .filter(|s| filter.accepts(s))
        .count();
    info!("dumping lists ({} services)", count);

    if let Some(header) = writer.header(session.frontend) {
        writeln!(out, "{}", header)?;
    }
    for tp in session.scanned() {
        if let Some(line) = writer.transponder(tp) {
            writeln!(out, "{}", line)?;
        }
        for service in tp.services.iter().filter(|s| filter.accepts(s)) {
            if let Some(line) = writer.service(tp, &presentable(service)) {
                writeln!(out, "{}", line)?;
            }
        }
    }
    out.flush()?;
    info!("Done.");
    Ok(count)
}

/// `# generated by dvbscan <version> on <date>`
fn generated_by() -> String {
    format!(
        "# generated by dvbscan {} on {}",
        env!("CARGO_PKG_VERSION"),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

fn is_dumpable(tp: &Transponder) -> bool {
    tp.status == ScanStatus::Scanned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AudioStream;
    use crate::session::ScanOptions;
    use crate::testing::fixtures::dvbt;
    use dvbscan_si::FrontendParameters;

    fn service(id: u16, video: u16, audio: u16) -> Service {
        let mut service = Service::new(id, 1);
        service.video_pid = video;
        if audio != 0 {
            service.audio.push(AudioStream {
                pid: audio,
                language: None,
            });
        }
        service
    }

    struct Names;

    impl OutputWriter for Names {
        fn service(&self, _tp: &Transponder, service: &Service) -> Option<String> {
            service.name.clone()
        }
    }

    fn session() -> ScanSession {
        let mut session = ScanSession::new(FrontendType::Terrestrial, ScanOptions::default());
        let id = session.add_transponder(FrontendParameters::Terrestrial(dvbt(474_000_000)));
        session.mark_scanned(id);
        let tp = session.get_mut(id);
        tp.status = ScanStatus::Scanned;

        let mut tv = service(1, 0x100, 0x110);
        tv.name = Some("News: 24".into());
        let radio = service(2, 0, 0x120);
        let mut pay = service(3, 0x200, 0x210);
        pay.scrambled = true;
        pay.name = Some("Pay".into());
        let data = service(4, 0, 0);
        tp.services = vec![tv, radio, pay, data];
        session
    }

    fn dump(filter: DumpFilter) -> (usize, String) {
        let mut out = Vec::new();
        let count = dump_lists(&session(), &Names, &filter, &mut out).unwrap();
        (count, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_default_filter() {
        let (count, text) = dump(DumpFilter::default());
        assert_eq!(count, 2);
        assert_eq!(text, "News  24\nservice_id 2\n");
    }

    #[test]
    fn test_selection_bits() {
        let (count, text) = dump(DumpFilter {
            selection: DumpFilter::OTHER,
            include_encrypted: false,
        });
        assert_eq!(count, 1);
        assert_eq!(text, "service_id 4\n");

        let (count, _) = dump(DumpFilter {
            selection: DumpFilter::TV | DumpFilter::RADIO | DumpFilter::OTHER,
            include_encrypted: true,
        });
        assert_eq!(count, 4);
    }
}
