//! ATSC VCT (Virtual Channel Table) parsing.
//!
//! Terrestrial (0xC8) and cable (0xC9) VCTs are carried on the PSIP base
//! PID 0x1FFB. Each virtual channel maps a major.minor channel number onto
//! a program of a transport stream.

use crate::descriptors::{decode_loop, DecodeContext, Descriptor};
use crate::error::{Result, SiError};
use crate::psi::PsiSection;
use crate::table_id;

const CHANNEL_LEN: usize = 32;

/// One elementary stream of a service location descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLocationElement {
    pub stream_type: u8,
    pub elementary_pid: u16,
    /// ISO 639 language code, empty code bytes give `None`.
    pub language: Option<String>,
}

/// ATSC service location descriptor (0xA1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceLocation {
    pub pcr_pid: u16,
    pub elements: Vec<ServiceLocationElement>,
}

impl ServiceLocation {
    pub fn parse(p: &[u8]) -> Result<Self> {
        if p.len() < 3 {
            return Err(SiError::DescriptorTooShort {
                tag: crate::descriptor_tag::SERVICE_LOCATION,
                actual: p.len(),
            });
        }
        let pcr_pid = u16::from_be_bytes([p[0] & 0x1F, p[1]]);
        let count = p[2] as usize;

        let elements = p[3..]
            .chunks_exact(6)
            .take(count)
            .map(|e| ServiceLocationElement {
                stream_type: e[0],
                elementary_pid: u16::from_be_bytes([e[1] & 0x1F, e[2]]),
                language: (e[3..6] != [0, 0, 0])
                    .then(|| e[3..6].iter().map(|&b| b as char).collect()),
            })
            .collect();

        Ok(ServiceLocation { pcr_pid, elements })
    }
}

/// Text of an extended channel name descriptor (0xA0).
///
/// Only uncompressed segments of the first string are used.
pub(crate) fn parse_extended_channel_name(p: &[u8]) -> Option<String> {
    let number_strings = *p.first()?;
    if number_strings == 0 {
        return None;
    }

    // language code (3) + number_segments (1)
    let mut offset = 1 + 3;
    let segments = *p.get(offset)?;
    offset += 1;

    let mut name = String::new();
    for _ in 0..segments {
        let compression = *p.get(offset)?;
        let length = *p.get(offset + 2)? as usize;
        let bytes = p.get(offset + 3..offset + 3 + length)?;
        offset += 3 + length;
        if compression == 0 {
            name.extend(bytes.iter().map(|&b| b as char));
        }
    }
    (!name.is_empty()).then_some(name)
}

/// One virtual channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VctChannel {
    /// Up to 7 UTF-16 code units, trailing NULs removed.
    pub short_name: String,
    pub major_channel_number: u16,
    pub minor_channel_number: u16,
    pub modulation_mode: u8,
    pub carrier_frequency: u32,
    pub channel_tsid: u16,
    pub program_number: u16,
    pub etm_location: u8,
    pub access_controlled: bool,
    pub hidden: bool,
    pub path_select: bool,
    pub out_of_band: bool,
    pub hide_guide: bool,
    pub service_type: u8,
    pub source_id: u16,
    pub service_location: Option<ServiceLocation>,
    pub extended_name: Option<String>,
}

impl VctChannel {
    /// Analog television.
    pub const SERVICE_ANALOG: u8 = 0x01;
    /// ATSC digital television.
    pub const SERVICE_DIGITAL_TV: u8 = 0x02;
    /// ATSC audio only.
    pub const SERVICE_AUDIO: u8 = 0x03;
}

/// Parsed VCT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VctTable {
    pub table_id: u8,
    pub transport_stream_id: u16,
    pub version_number: u8,
    pub protocol_version: u8,
    pub channels: Vec<VctChannel>,
}

impl VctTable {
    pub fn parse(section: &PsiSection) -> Result<Self> {
        let table = section.header.table_id;
        if table != table_id::TVCT && table != table_id::CVCT {
            return Err(SiError::UnexpectedTable(table));
        }

        let data = section.data;
        if data.len() < 2 {
            return Err(SiError::TooShort {
                need: 2,
                actual: data.len(),
            });
        }
        let ctx = DecodeContext::for_table(table);
        let num_channels = data[1] as usize;

        let mut channels = Vec::with_capacity(num_channels);
        let mut offset = 2;
        for _ in 0..num_channels {
            if offset + CHANNEL_LEN > data.len() {
                return Err(SiError::TooShort {
                    need: offset + CHANNEL_LEN,
                    actual: data.len(),
                });
            }
            let ch = &data[offset..offset + CHANNEL_LEN];

            let units: Vec<u16> = ch[0..14]
                .chunks_exact(2)
                .map(|u| u16::from_be_bytes([u[0], u[1]]))
                .take_while(|&u| u != 0)
                .collect();
            let descriptors_length = u16::from_be_bytes([ch[30] & 0x03, ch[31]]) as usize;

            let mut channel = VctChannel {
                short_name: String::from_utf16_lossy(&units),
                major_channel_number: ((ch[14] as u16 & 0x0F) << 6) | (ch[15] as u16 >> 2),
                minor_channel_number: ((ch[15] as u16 & 0x03) << 8) | ch[16] as u16,
                modulation_mode: ch[17],
                carrier_frequency: u32::from_be_bytes([ch[18], ch[19], ch[20], ch[21]]),
                channel_tsid: u16::from_be_bytes([ch[22], ch[23]]),
                program_number: u16::from_be_bytes([ch[24], ch[25]]),
                etm_location: ch[26] >> 6,
                access_controlled: ch[26] & 0x20 != 0,
                hidden: ch[26] & 0x10 != 0,
                path_select: ch[26] & 0x08 != 0,
                out_of_band: ch[26] & 0x04 != 0,
                hide_guide: ch[26] & 0x02 != 0,
                service_type: ch[27] & 0x3F,
                source_id: u16::from_be_bytes([ch[28], ch[29]]),
                service_location: None,
                extended_name: None,
            };
            offset += CHANNEL_LEN;

            if offset + descriptors_length > data.len() {
                return Err(SiError::LoopOverrun {
                    length: descriptors_length,
                    available: data.len() - offset,
                });
            }
            for descriptor in decode_loop(&data[offset..offset + descriptors_length], &ctx)? {
                match descriptor {
                    Descriptor::ServiceLocation(location) => {
                        channel.service_location = Some(location)
                    }
                    Descriptor::ExtendedChannelName(name) => channel.extended_name = name,
                    _ => {}
                }
            }
            offset += descriptors_length;
            channels.push(channel);
        }

        Ok(VctTable {
            table_id: table,
            transport_stream_id: section.header.table_id_extension,
            version_number: section.header.version_number,
            protocol_version: data[0],
            channels,
        })
    }
}
