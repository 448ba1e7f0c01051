//! PMT (Program Map Table) parsing.
//!
//! The PMT lists the elementary streams of one program. Private data
//! streams are classified by probing their descriptors.

use bytes::{BufMut, Bytes};

use crate::descriptors::{decode_loop, find_descriptor, DecodeContext, Descriptor};
use crate::encode::{put_loop, SectionBuilder};
use crate::error::{Result, SiError};
use crate::psi::PsiSection;
use crate::{descriptor_tag, stream_type, table_id};

/// What an elementary stream carries, as far as the scanner cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    /// AC-3 or E-AC-3 audio.
    Ac3,
    Teletext,
    Subtitling,
    /// Private data stream without a recognised descriptor.
    UnknownPrivate,
    Other,
}

/// Elementary stream in the PMT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmtStream {
    /// Stream type.
    pub stream_type: u8,
    /// Elementary PID.
    pub elementary_pid: u16,
    /// Stream descriptors (raw).
    pub descriptors: Vec<u8>,
    /// Classification.
    pub kind: StreamKind,
    /// ISO 639 language code, if signalled.
    pub language: Option<String>,
}

impl PmtStream {
    pub fn is_video(&self) -> bool {
        self.kind == StreamKind::Video
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.kind, StreamKind::Audio | StreamKind::Ac3)
    }
}

/// Private data probes, in priority order.
const PRIVATE_PROBES: [(u8, StreamKind); 4] = [
    (descriptor_tag::TELETEXT, StreamKind::Teletext),
    (descriptor_tag::SUBTITLING, StreamKind::Subtitling),
    (descriptor_tag::AC3, StreamKind::Ac3),
    (descriptor_tag::ENHANCED_AC3, StreamKind::Ac3),
];

fn classify(stream: u8, descriptors: &[u8]) -> Result<StreamKind> {
    Ok(match stream {
        stream_type::MPEG1_VIDEO | stream_type::MPEG2_VIDEO | stream_type::H264_VIDEO => {
            StreamKind::Video
        }
        stream_type::MPEG1_AUDIO
        | stream_type::MPEG2_AUDIO
        | stream_type::AAC_ADTS
        | stream_type::AAC_LATM => StreamKind::Audio,
        stream_type::PRIVATE_SECTIONS | stream_type::PRIVATE_PES => {
            for (probe, kind) in PRIVATE_PROBES {
                if find_descriptor(descriptors, probe)?.is_some() {
                    return Ok(kind);
                }
            }
            StreamKind::UnknownPrivate
        }
        stream_type::ATSC_AC3 => StreamKind::Ac3,
        _ => StreamKind::Other,
    })
}

/// Parsed PMT (Program Map Table).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PmtTable {
    /// Program number (service id).
    pub program_number: u16,
    /// Version number.
    pub version_number: u8,
    /// PCR PID.
    pub pcr_pid: u16,
    /// Program info descriptors (raw).
    pub program_info: Vec<u8>,
    /// CA system ids from program and stream level CA descriptors.
    pub ca_system_ids: Vec<u16>,
    /// Elementary streams.
    pub streams: Vec<PmtStream>,
}

impl PmtTable {
    /// Parse a PMT from a PSI section.
    pub fn parse(section: &PsiSection) -> Result<Self> {
        if section.header.table_id != table_id::PMT {
            return Err(SiError::UnexpectedTable(section.header.table_id));
        }

        let data = section.data;
        if data.len() < 4 {
            return Err(SiError::TooShort {
                need: 4,
                actual: data.len(),
            });
        }

        let ctx = DecodeContext::for_table(table_id::PMT);
        let pcr_pid = u16::from_be_bytes([data[0] & 0x1F, data[1]]);
        let program_info_length = u16::from_be_bytes([data[2] & 0x0F, data[3]]) as usize;
        if 4 + program_info_length > data.len() {
            return Err(SiError::LoopOverrun {
                length: program_info_length,
                available: data.len() - 4,
            });
        }
        let program_info = &data[4..4 + program_info_length];

        let mut ca_system_ids = Vec::new();
        collect_ca_ids(&decode_loop(program_info, &ctx)?, &mut ca_system_ids);

        let mut streams = Vec::new();
        let mut offset = 4 + program_info_length;
        while offset + 5 <= data.len() {
            let stream_type = data[offset];
            let elementary_pid = u16::from_be_bytes([data[offset + 1] & 0x1F, data[offset + 2]]);
            let es_info_length =
                u16::from_be_bytes([data[offset + 3] & 0x0F, data[offset + 4]]) as usize;
            offset += 5;

            if offset + es_info_length > data.len() {
                return Err(SiError::LoopOverrun {
                    length: es_info_length,
                    available: data.len() - offset,
                });
            }
            let descriptors = &data[offset..offset + es_info_length];
            offset += es_info_length;

            let decoded = decode_loop(descriptors, &ctx)?;
            collect_ca_ids(&decoded, &mut ca_system_ids);
            let language = decoded.into_iter().find_map(|d| match d {
                Descriptor::Language(code) => Some(code),
                _ => None,
            });

            streams.push(PmtStream {
                stream_type,
                elementary_pid,
                descriptors: descriptors.to_vec(),
                kind: classify(stream_type, descriptors)?,
                language,
            });
        }

        Ok(PmtTable {
            program_number: section.header.table_id_extension,
            version_number: section.header.version_number,
            pcr_pid,
            program_info: program_info.to_vec(),
            ca_system_ids,
            streams,
        })
    }

    /// Get the first video stream.
    pub fn video_stream(&self) -> Option<&PmtStream> {
        self.streams.iter().find(|s| s.is_video())
    }

    /// Encode as a single section; stream kinds are carried by the raw descriptors.
    pub fn encode(&self) -> Bytes {
        let mut builder =
            SectionBuilder::new(table_id::PMT, self.program_number).version(self.version_number);
        let body = builder.body_mut();
        body.put_u16(0xE000 | (self.pcr_pid & 0x1FFF));
        put_loop(body, &self.program_info);
        for stream in &self.streams {
            body.put_u8(stream.stream_type);
            body.put_u16(0xE000 | (stream.elementary_pid & 0x1FFF));
            put_loop(body, &stream.descriptors);
        }
        builder.finish()
    }
}

fn collect_ca_ids(descriptors: &[Descriptor], ids: &mut Vec<u16>) {
    for descriptor in descriptors {
        if let Descriptor::Ca(id) = descriptor {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
    }
}
