//! Applying decoded tables to the scan session.
//!
//! PAT, PMT, SDT and VCT sections describe the transponder currently tuned;
//! NIT sections describe the whole network and may update or add other
//! transponders. Sections arrive in any order, so every handler creates
//! services on first mention and fills in what it knows.

use dvbscan_si::{
    stream_type, table_id, DecodeContext, FrontendParameters, NitTable, PatTable, PmtTable,
    PsiSection, SdtTable, SiError, StreamKind, VctChannel, VctTable,
};
use log::{debug, info, trace, warn};

use crate::delivery::DeliverySystem;
use crate::model::{Push, Transponder, AC3_CHAN_MAX, AUDIO_CHAN_MAX, CA_SYSTEM_ID_MAX};
use crate::session::ScanSession;

/// Synthetic service ids for VCT channels without a program number count
/// down from here.
const PSEUDO_SERVICE_ID: u16 = 0xFFFF;

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim_end_matches('\0');
    (!text.is_empty()).then(|| text.to_string())
}

fn warn_full(push: Push, max: usize, what: &str) {
    if push == Push::Full {
        warn!("more than {} {}, truncating", max, what);
    }
}

impl ScanSession {
    /// Decodes one section and applies it.
    ///
    /// Returns the PMT pids that still need a filter.
    pub fn handle_section(&mut self, table: u8, data: &[u8]) -> Result<Vec<u16>, SiError> {
        let section = PsiSection::parse(data)?;
        match table {
            table_id::PAT => return Ok(self.handle_pat(&PatTable::parse(&section)?)),
            table_id::PMT => self.handle_pmt(&PmtTable::parse(&section)?),
            table_id::NIT_ACTUAL | table_id::NIT_OTHER => {
                let mut ctx = DecodeContext::new(table, self.frontend);
                ctx.inversion = self.options.inversion;
                self.handle_nit(&NitTable::parse(&section, &ctx)?);
            }
            table_id::SDT_ACTUAL => self.handle_sdt(&SdtTable::parse(&section)?),
            table_id::TVCT | table_id::CVCT => self.handle_vct(&VctTable::parse(&section)?),
            other => debug!("No handler for table 0x{:02x}", other),
        }
        Ok(Vec::new())
    }

    /// Registers the programs of the current transponder.
    pub fn handle_pat(&mut self, pat: &PatTable) -> Vec<u16> {
        let Some(tp) = self.current_mut() else {
            return Vec::new();
        };
        if tp.transport_stream_id == 0 {
            tp.set_transport_stream_id(pat.transport_stream_id);
        }

        let mut pmt_pids = Vec::new();
        for entry in &pat.programs {
            // SDT might have been parsed first
            let service = tp.service_entry(entry.program_number);
            service.pmt_pid = entry.pid;
            if !service.pmt_requested && entry.pid != 0 {
                service.pmt_requested = true;
                pmt_pids.push(entry.pid);
            }
        }
        pmt_pids
    }

    pub fn handle_pmt(&mut self, pmt: &PmtTable) {
        let Some(tp) = self.current_mut() else {
            return;
        };
        let Some(service) = tp.find_service_mut(pmt.program_number) else {
            warn!("PMT for service_id 0x{:04x} was not in PAT", pmt.program_number);
            return;
        };

        service.pcr_pid = pmt.pcr_pid;
        for &id in &pmt.ca_system_ids {
            warn_full(service.push_ca_id(id), CA_SYSTEM_ID_MAX, "CA system ids");
        }

        for stream in &pmt.streams {
            let pid = stream.elementary_pid;
            match stream.kind {
                StreamKind::Video => {
                    trace!("  VIDEO     : PID 0x{:04x}", pid);
                    if service.video_pid == 0 {
                        service.video_pid = pid;
                        service.video_stream_type = stream.stream_type;
                    }
                }
                StreamKind::Audio => {
                    trace!("  AUDIO     : PID 0x{:04x}", pid);
                    let push = service.push_audio(pid, stream.language.clone());
                    warn_full(push, AUDIO_CHAN_MAX, "audio channels");
                }
                StreamKind::Ac3 => {
                    trace!("  AC3       : PID 0x{:04x}", pid);
                    let push = service.push_ac3(pid, stream.language.clone());
                    warn_full(push, AC3_CHAN_MAX, "ac3 audio channels");
                }
                StreamKind::Teletext => {
                    trace!("  TELETEXT  : PID 0x{:04x}", pid);
                    service.teletext_pid = pid;
                }
                StreamKind::Subtitling => {
                    trace!("  SUBTITLING: PID 0x{:04x}", pid);
                    service.subtitling_pid = pid;
                }
                StreamKind::UnknownPrivate => {
                    debug!("  unknown private data: PID 0x{:04x}", pid);
                }
                StreamKind::Other => {
                    trace!("  OTHER     : PID 0x{:04x} TYPE 0x{:02x}", pid, stream.stream_type);
                }
            }
        }

        debug!(
            "0x{:04x} 0x{:04x}: {} -- {}, pmt_pid 0x{:04x}, vpid 0x{:04x}, {} audio",
            service.transport_stream_id,
            service.service_id,
            service.provider_name.as_deref().unwrap_or(""),
            service.name.as_deref().unwrap_or(""),
            service.pmt_pid,
            service.video_pid,
            service.audio.len() + service.ac3.len()
        );
    }

    pub fn handle_sdt(&mut self, sdt: &SdtTable) {
        let Some(tp) = self.current_mut() else {
            return;
        };
        if sdt.truncated {
            warn!(
                "section too short: SDT of transport_stream_id 0x{:04x} truncated",
                sdt.transport_stream_id
            );
        }

        for entry in &sdt.services {
            // maybe PAT has not yet been parsed
            let service = tp.service_entry(entry.service_id);
            service.running = entry.running_status;
            service.scrambled = entry.free_ca_mode;

            if let Some(descriptor) = &entry.service_descriptor {
                service.service_type = descriptor.service_type;
                service.provider_name = non_empty(&descriptor.provider_name.text);
                service.name = non_empty(&descriptor.service_name.text);
                service.short_name = descriptor
                    .service_name
                    .short
                    .as_deref()
                    .and_then(non_empty);
            }
            if let Some(ids) = &entry.ca_identifiers {
                service.ca_ids.clear();
                for &id in ids {
                    warn_full(service.push_ca_id(id), CA_SYSTEM_ID_MAX, "CA system ids");
                }
            }
        }
    }

    /// Updates known transponders from a NIT and queues new ones.
    ///
    /// Only NIT actual may change the parameters of a known transponder.
    /// Applying the same NIT twice leaves the session unchanged.
    pub fn handle_nit(&mut self, nit: &NitTable) {
        let actual = nit.table_id == table_id::NIT_ACTUAL;
        if actual {
            if let (Some(name), Some(tp)) = (&nit.network_name, self.current_mut()) {
                tp.network_name = Some(name.clone());
            }
        }

        for ts in &nit.transport_streams {
            let Some(mut params) = ts.delivery else {
                trace!("transport_stream_id 0x{:04x} without delivery descriptor", ts.transport_stream_id);
                continue;
            };
            if params.frontend_type() != self.frontend {
                continue;
            }
            debug!("transport_stream_id 0x{:04x}", ts.transport_stream_id);

            match self.find_transponder(&params) {
                Some(id) => {
                    if !actual || !self.frontend.parameters_differ(&self.get(id).params, &params, false) {
                        continue;
                    }
                    let tp = self.get_mut(id);
                    info!("\tupdating transponder:\n\t   ({})", tp.params);
                    tp.params = params;
                    tp.network_id = nit.network_id;
                    tp.original_network_id = ts.original_network_id;
                    tp.set_transport_stream_id(ts.transport_stream_id);
                    tp.other_frequency = ts.other_frequency;
                    tp.alternate_frequencies = ts.frequency_list.clone();
                    tp.updated_by_nit = true;
                    info!("\tto ({})", tp.params);
                }
                None if self.options.add_frequencies => {
                    // NIT does not signal pilots
                    if let FrontendParameters::Satellite(p) = &mut params {
                        p.pilot = dvbscan_si::Pilot::Auto;
                    }
                    let mut tp = Transponder::new(params);
                    tp.network_id = nit.network_id;
                    tp.original_network_id = ts.original_network_id;
                    tp.transport_stream_id = ts.transport_stream_id;
                    tp.other_frequency = ts.other_frequency;
                    tp.alternate_frequencies = ts.frequency_list.clone();
                    info!("\tnew transponder:\n\t   ({})", tp.params);
                    self.insert(tp);
                }
                None => {}
            }
        }
    }

    /// Registers the virtual channels of an ATSC transponder.
    pub fn handle_vct(&mut self, vct: &VctTable) {
        let Some(tp) = self.current_mut() else {
            return;
        };

        let mut pseudo_id = PSEUDO_SERVICE_ID;
        for channel in &vct.channels {
            match channel.service_type {
                VctChannel::SERVICE_ANALOG => {
                    info!("analog channels won't be put into the channel list");
                }
                VctChannel::SERVICE_DIGITAL_TV | VctChannel::SERVICE_AUDIO => {}
                other => {
                    debug!("Skipping virtual channel of service type 0x{:02x}", other);
                    continue;
                }
            }

            let service_id = if channel.program_number == 0 {
                pseudo_id -= 1;
                pseudo_id
            } else {
                channel.program_number
            };
            let service = tp.service_entry(service_id);
            service.name = non_empty(&channel.short_name);

            if let Some(location) = &channel.service_location {
                service.pcr_pid = location.pcr_pid;
                for element in &location.elements {
                    match element.stream_type {
                        stream_type::MPEG2_VIDEO => {
                            service.video_pid = element.elementary_pid;
                            service.video_stream_type = element.stream_type;
                        }
                        stream_type::ATSC_AC3 => {
                            let push =
                                service.push_audio(element.elementary_pid, element.language.clone());
                            warn_full(push, AUDIO_CHAN_MAX, "audio channels");
                        }
                        other => warn!("unhandled stream_type: 0x{:02x}", other),
                    }
                }
            }
            if let Some(name) = &channel.extended_name {
                service.name = non_empty(name);
            }

            service.channel_number = Some(
                u32::from(channel.major_channel_number) << 10 | u32::from(channel.minor_channel_number),
            );
            service.running = if channel.hidden { 1 } else { 4 };
            service.scrambled = channel.access_controlled;
            info!(
                " Channel number: {}:{}. Name: '{}'",
                channel.major_channel_number,
                channel.minor_channel_number,
                service.name.as_deref().unwrap_or("")
            );
        }
    }
}
