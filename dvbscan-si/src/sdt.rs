//! SDT (Service Description Table) parsing.
//!
//! The SDT is transmitted on PID 0x0011 and contains information about
//! services (channels) in a transport stream.

use bytes::{BufMut, Bytes};

use crate::descriptors::{decode_loop, DecodeContext, Descriptor, ServiceDescriptor};
use crate::encode::SectionBuilder;
use crate::error::{Result, SiError};
use crate::psi::PsiSection;
use crate::table_id;

/// Service entry in the SDT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdtService {
    /// Service ID (program number).
    pub service_id: u16,
    /// EIT schedule flag.
    pub eit_schedule_flag: bool,
    /// EIT present/following flag.
    pub eit_present_following_flag: bool,
    /// Running status.
    pub running_status: u8,
    /// Free CA mode.
    pub free_ca_mode: bool,
    /// Service descriptors (raw).
    pub descriptors: Vec<u8>,
    /// Parsed service descriptor.
    pub service_descriptor: Option<ServiceDescriptor>,
    /// CA system ids from a CA identifier descriptor.
    pub ca_identifiers: Option<Vec<u16>>,
}

impl SdtService {
    /// Get service name (from service descriptor).
    pub fn service_name(&self) -> Option<&str> {
        self.service_descriptor
            .as_ref()
            .map(|d| d.service_name.text.as_str())
    }

    /// Get running status name.
    pub fn running_status_name(&self) -> &'static str {
        match self.running_status {
            0 => "undefined",
            1 => "not running",
            2 => "starts in a few seconds",
            3 => "pausing",
            4 => "running",
            5 => "service off-air",
            _ => "reserved",
        }
    }
}

/// Parsed SDT (Service Description Table).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdtTable {
    /// Transport stream ID.
    pub transport_stream_id: u16,
    /// Version number.
    pub version_number: u8,
    /// Original network ID.
    pub original_network_id: u16,
    /// Services.
    pub services: Vec<SdtService>,
    /// Service loop stopped early on an empty or oversized descriptor loop.
    pub truncated: bool,
}

impl SdtTable {
    /// Parse an SDT (actual or other) from a PSI section.
    pub fn parse(section: &PsiSection) -> Result<Self> {
        let table = section.header.table_id;
        if table != table_id::SDT_ACTUAL && table != table_id::SDT_OTHER {
            return Err(SiError::UnexpectedTable(table));
        }

        let data = section.data;
        if data.len() < 3 {
            return Err(SiError::TooShort {
                need: 3,
                actual: data.len(),
            });
        }

        let ctx = DecodeContext::for_table(table);
        let mut sdt = SdtTable {
            transport_stream_id: section.header.table_id_extension,
            version_number: section.header.version_number,
            original_network_id: u16::from_be_bytes([data[0], data[1]]),
            services: Vec::new(),
            truncated: false,
        };

        // Skip original_network_id and reserved byte
        let mut offset = 3;
        while offset + 5 <= data.len() {
            let service_id = u16::from_be_bytes([data[offset], data[offset + 1]]);
            let flags = data[offset + 2];
            let status = data[offset + 3];
            let descriptors_loop_length =
                u16::from_be_bytes([status & 0x0F, data[offset + 4]]) as usize;
            offset += 5;

            if descriptors_loop_length == 0 || offset + descriptors_loop_length > data.len() {
                sdt.truncated = true;
                break;
            }
            let descriptors = &data[offset..offset + descriptors_loop_length];
            offset += descriptors_loop_length;

            let mut service = SdtService {
                service_id,
                eit_schedule_flag: flags & 0x02 != 0,
                eit_present_following_flag: flags & 0x01 != 0,
                running_status: (status >> 5) & 0x07,
                free_ca_mode: (status >> 4) & 0x01 != 0,
                descriptors: descriptors.to_vec(),
                service_descriptor: None,
                ca_identifiers: None,
            };
            for descriptor in decode_loop(descriptors, &ctx)? {
                match descriptor {
                    Descriptor::Service(d) => service.service_descriptor = Some(d),
                    Descriptor::CaIdentifier(ids) => service.ca_identifiers = Some(ids),
                    _ => {}
                }
            }
            sdt.services.push(service);
        }

        Ok(sdt)
    }

    /// Find service by service ID.
    pub fn find_service(&self, service_id: u16) -> Option<&SdtService> {
        self.services.iter().find(|s| s.service_id == service_id)
    }

    /// Encode as an SDT actual section from the raw descriptor loops.
    pub fn encode(&self) -> Bytes {
        let mut builder = SectionBuilder::new(table_id::SDT_ACTUAL, self.transport_stream_id)
            .version(self.version_number);
        let body = builder.body_mut();
        body.put_u16(self.original_network_id);
        body.put_u8(0xFF);
        for service in &self.services {
            body.put_u16(service.service_id);
            body.put_u8(
                0xFC | (service.eit_schedule_flag as u8) << 1
                    | service.eit_present_following_flag as u8,
            );
            body.put_u16(
                (service.running_status as u16 & 0x07) << 13
                    | (service.free_ca_mode as u16) << 12
                    | (service.descriptors.len() as u16 & 0x0FFF),
            );
            body.put_slice(&service.descriptors);
        }
        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{descriptor, service_descriptor};
    use crate::descriptor_tag;

    fn service(service_id: u16, descriptors: Vec<u8>) -> SdtService {
        SdtService {
            service_id,
            running_status: 4,
            descriptors,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_sdt() {
        let mut scrambled = service(102, service_descriptor(0x02, "Prov", "Chan2"));
        scrambled.free_ca_mode = true;
        scrambled
            .descriptors
            .extend(descriptor(descriptor_tag::CA_IDENTIFIER, &[0x01, 0x00]));

        let sdt = SdtTable {
            transport_stream_id: 0x0401,
            version_number: 1,
            original_network_id: 0x2174,
            services: vec![service(101, service_descriptor(0x01, "Prov", "Chan1")), scrambled],
            truncated: false,
        };
        let raw = sdt.encode();
        let decoded = SdtTable::parse(&PsiSection::parse(&raw).unwrap()).unwrap();

        assert_eq!(decoded.original_network_id, 0x2174);
        assert!(!decoded.truncated);
        assert_eq!(decoded.services.len(), 2);

        let chan1 = decoded.find_service(101).unwrap();
        assert_eq!(chan1.service_name(), Some("Chan1"));
        assert_eq!(chan1.running_status_name(), "running");
        assert!(!chan1.free_ca_mode);

        let chan2 = decoded.find_service(102).unwrap();
        assert!(chan2.free_ca_mode);
        assert_eq!(chan2.ca_identifiers, Some(vec![0x0100]));
        assert_eq!(
            chan2.service_descriptor.as_ref().map(|d| d.service_type),
            Some(0x02)
        );
    }

    #[test]
    fn test_empty_descriptor_loop_stops_parsing() {
        let sdt = SdtTable {
            services: vec![
                service(1, service_descriptor(0x01, "", "A")),
                service(2, Vec::new()),
                service(3, service_descriptor(0x01, "", "C")),
            ],
            ..Default::default()
        };
        let raw = sdt.encode();
        let decoded = SdtTable::parse(&PsiSection::parse(&raw).unwrap()).unwrap();
        assert!(decoded.truncated);
        assert_eq!(decoded.services.len(), 1);
        assert_eq!(decoded.services[0].service_id, 1);
    }
}
