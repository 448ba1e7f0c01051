//! NIT (Network Information Table) parsing.
//!
//! The NIT is transmitted on PID 0x0010 and describes the transport
//! streams of a network, including their physical delivery parameters.

use bytes::{BufMut, Bytes};

use crate::descriptors::{decode_loop, DecodeContext, Descriptor};
use crate::encode::{put_loop, SectionBuilder};
use crate::error::{Result, SiError};
use crate::psi::PsiSection;
use crate::table_id;
use crate::types::{FrontendParameters, SatSystem};

/// Transport stream entry in the NIT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NitTransportStream {
    /// Transport stream ID.
    pub transport_stream_id: u16,
    /// Original network ID.
    pub original_network_id: u16,
    /// Transport descriptors (raw).
    pub descriptors: Vec<u8>,
    /// Delivery parameters, when a descriptor for the frontend's system is present.
    pub delivery: Option<FrontendParameters>,
    /// Terrestrial other_frequency_flag.
    pub other_frequency: bool,
    /// Alternate frequencies from the first frequency list descriptor.
    pub frequency_list: Vec<u32>,
}

impl NitTransportStream {
    fn apply(&mut self, descriptor: Descriptor) {
        match descriptor {
            Descriptor::SatelliteDelivery(params) => {
                self.delivery = Some(FrontendParameters::Satellite(params));
            }
            Descriptor::S2SatelliteDelivery => {
                if let Some(FrontendParameters::Satellite(params)) = &mut self.delivery {
                    params.system = SatSystem::DvbS2;
                }
            }
            Descriptor::CableDelivery(params) => {
                self.delivery = Some(FrontendParameters::Cable(params));
            }
            Descriptor::TerrestrialDelivery {
                params,
                other_frequency,
            } => {
                self.delivery = Some(FrontendParameters::Terrestrial(params));
                self.other_frequency = other_frequency;
            }
            Descriptor::FrequencyList(list) if self.frequency_list.is_empty() => {
                self.frequency_list = list;
            }
            _ => {}
        }
    }
}

/// Parsed NIT (Network Information Table).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NitTable {
    /// Table ID (actual or other).
    pub table_id: u8,
    /// Network ID.
    pub network_id: u16,
    /// Version number.
    pub version_number: u8,
    /// Network name (from descriptor), `None` when absent or empty.
    pub network_name: Option<String>,
    /// Network descriptors (raw).
    pub network_descriptors: Vec<u8>,
    /// Transport stream loop.
    pub transport_streams: Vec<NitTransportStream>,
}

impl NitTable {
    /// Parse a NIT from a PSI section.
    ///
    /// Delivery descriptors are only decoded for the delivery system in `ctx`.
    pub fn parse(section: &PsiSection, ctx: &DecodeContext) -> Result<Self> {
        let table = section.header.table_id;
        if table != table_id::NIT_ACTUAL && table != table_id::NIT_OTHER {
            return Err(SiError::UnexpectedTable(table));
        }
        let ctx = DecodeContext {
            table_id: table,
            ..*ctx
        };

        let data = section.data;
        if data.len() < 2 {
            return Err(SiError::TooShort {
                need: 2,
                actual: data.len(),
            });
        }

        // Network descriptors length
        let network_descriptors_length = u16::from_be_bytes([data[0] & 0x0F, data[1]]) as usize;
        if data.len() < 2 + network_descriptors_length + 2 {
            return Err(SiError::LoopOverrun {
                length: network_descriptors_length,
                available: data.len() - 2,
            });
        }
        let network_descriptors = &data[2..2 + network_descriptors_length];

        let network_name = decode_loop(network_descriptors, &ctx)?
            .into_iter()
            .find_map(|d| match d {
                Descriptor::NetworkName(name) if !name.text.is_empty() => Some(name.text),
                _ => None,
            });

        // Transport stream loop length
        let ts_loop_offset = 2 + network_descriptors_length;
        let ts_loop_length =
            u16::from_be_bytes([data[ts_loop_offset] & 0x0F, data[ts_loop_offset + 1]]) as usize;
        let mut offset = ts_loop_offset + 2;
        let ts_loop_end = (offset + ts_loop_length).min(data.len());

        let mut transport_streams = Vec::new();
        while offset + 6 <= ts_loop_end {
            let transport_stream_id = u16::from_be_bytes([data[offset], data[offset + 1]]);
            let original_network_id = u16::from_be_bytes([data[offset + 2], data[offset + 3]]);
            let ts_descriptors_length =
                u16::from_be_bytes([data[offset + 4] & 0x0F, data[offset + 5]]) as usize;
            offset += 6;

            if offset + ts_descriptors_length > ts_loop_end {
                return Err(SiError::LoopOverrun {
                    length: ts_descriptors_length,
                    available: ts_loop_end - offset,
                });
            }
            let descriptors = &data[offset..offset + ts_descriptors_length];
            offset += ts_descriptors_length;

            let mut ts = NitTransportStream {
                transport_stream_id,
                original_network_id,
                descriptors: descriptors.to_vec(),
                delivery: None,
                other_frequency: false,
                frequency_list: Vec::new(),
            };
            for descriptor in decode_loop(descriptors, &ctx)? {
                ts.apply(descriptor);
            }
            transport_streams.push(ts);
        }

        Ok(NitTable {
            table_id: table,
            network_id: section.header.table_id_extension,
            version_number: section.header.version_number,
            network_name,
            network_descriptors: network_descriptors.to_vec(),
            transport_streams,
        })
    }

    /// Find transport stream by TSID.
    pub fn find_transport_stream(&self, tsid: u16) -> Option<&NitTransportStream> {
        self.transport_streams
            .iter()
            .find(|ts| ts.transport_stream_id == tsid)
    }

    /// Encode as a single section from the raw descriptor loops.
    pub fn encode(&self) -> Bytes {
        let mut builder =
            SectionBuilder::new(self.table_id, self.network_id).version(self.version_number);
        let body = builder.body_mut();
        put_loop(body, &self.network_descriptors);

        let mut ts_loop = Vec::new();
        for ts in &self.transport_streams {
            ts_loop.put_u16(ts.transport_stream_id);
            ts_loop.put_u16(ts.original_network_id);
            ts_loop.put_u16(0xF000 | (ts.descriptors.len() as u16 & 0x0FFF));
            ts_loop.put_slice(&ts.descriptors);
        }
        put_loop(body, &ts_loop);
        builder.finish()
    }
}
