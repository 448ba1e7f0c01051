//! Section and descriptor encoding.
//!
//! Builds long-form sections with a valid CRC32. Used to write replay
//! fixtures and by the table `encode` methods.

use bytes::{BufMut, Bytes, BytesMut};

use crate::descriptor_tag as tag;
use crate::psi::crc32_mpeg2;
use crate::types::*;

/// Builder for one long-form (syntax indicator set) section.
#[derive(Debug, Clone)]
pub struct SectionBuilder {
    table_id: u8,
    table_id_extension: u16,
    version_number: u8,
    section_number: u8,
    last_section_number: u8,
    body: BytesMut,
}

impl SectionBuilder {
    pub fn new(table_id: u8, table_id_extension: u16) -> Self {
        SectionBuilder {
            table_id,
            table_id_extension,
            version_number: 0,
            section_number: 0,
            last_section_number: 0,
            body: BytesMut::new(),
        }
    }

    pub fn version(mut self, version_number: u8) -> Self {
        self.version_number = version_number & 0x1F;
        self
    }

    pub fn section_number(mut self, section_number: u8, last_section_number: u8) -> Self {
        self.section_number = section_number;
        self.last_section_number = last_section_number;
        self
    }

    /// Table-specific body, between the extended header and the CRC.
    pub fn body_mut(&mut self) -> &mut BytesMut {
        &mut self.body
    }

    pub fn finish(self) -> Bytes {
        // extended header (5) + body + CRC (4)
        let section_length = 5 + self.body.len() + 4;
        let mut out = BytesMut::with_capacity(3 + section_length);
        out.put_u8(self.table_id);
        out.put_u16(0xB000 | (section_length as u16 & 0x0FFF));
        out.put_u16(self.table_id_extension);
        out.put_u8(0xC1 | (self.version_number << 1));
        out.put_u8(self.section_number);
        out.put_u8(self.last_section_number);
        out.put_slice(&self.body);
        let crc = crc32_mpeg2(&out);
        out.put_u32(crc);
        out.freeze()
    }
}

/// Write `content` prefixed by a 12-bit length with the top reserved bits set.
pub fn put_loop(buf: &mut BytesMut, content: &[u8]) {
    buf.put_u16(0xF000 | (content.len() as u16 & 0x0FFF));
    buf.put_slice(content);
}

/// One descriptor: tag, length, payload.
pub fn descriptor(descriptor_tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + payload.len());
    out.push(descriptor_tag);
    out.push(payload.len() as u8);
    out.extend_from_slice(payload);
    out
}

pub fn network_name_descriptor(name: &str) -> Vec<u8> {
    descriptor(tag::NETWORK_NAME, name.as_bytes())
}

pub fn service_descriptor(service_type: u8, provider: &str, name: &str) -> Vec<u8> {
    let mut payload = vec![service_type, provider.len() as u8];
    payload.extend_from_slice(provider.as_bytes());
    payload.push(name.len() as u8);
    payload.extend_from_slice(name.as_bytes());
    descriptor(tag::SERVICE, &payload)
}

fn to_bcd(mut value: u32, digits: usize) -> Vec<u8> {
    let mut nibbles = vec![0u8; digits];
    for nibble in nibbles.iter_mut().rev() {
        *nibble = (value % 10) as u8;
        value /= 10;
    }
    nibbles.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect()
}

fn fec_inner_code(fec: CodeRate) -> u8 {
    match fec {
        CodeRate::Fec1_2 => 1,
        CodeRate::Fec2_3 => 2,
        CodeRate::Fec3_4 => 3,
        CodeRate::Fec5_6 => 4,
        CodeRate::Fec7_8 => 5,
        CodeRate::Fec8_9 => 6,
        CodeRate::Fec3_5 => 7,
        CodeRate::Fec4_5 => 8,
        CodeRate::Fec9_10 => 9,
        CodeRate::None => 15,
        _ => 0,
    }
}

fn symbol_rate_bcd(symbol_rate: u32, fec: CodeRate) -> Vec<u8> {
    let mut out = to_bcd(symbol_rate / 10, 8);
    out[3] = (out[3] & 0xF0) | fec_inner_code(fec);
    out
}

pub fn cable_delivery_descriptor(p: &CableParams) -> Vec<u8> {
    let mut payload = to_bcd(p.frequency / 100, 8);
    payload.push(0xFF);
    payload.push(0xF0);
    payload.push(match p.modulation {
        Modulation::Qam16 => 1,
        Modulation::Qam32 => 2,
        Modulation::Qam64 => 3,
        Modulation::Qam128 => 4,
        Modulation::Qam256 => 5,
        _ => 0,
    });
    payload.extend(symbol_rate_bcd(p.symbol_rate, p.fec_inner));
    descriptor(tag::CABLE_DELIVERY, &payload)
}

pub fn satellite_delivery_descriptor(p: &SatelliteParams) -> Vec<u8> {
    let mut payload = to_bcd(p.frequency / 10, 8);
    payload.extend(to_bcd(p.orbital_position as u32, 4));
    let polarization = match p.polarization {
        Polarization::Horizontal => 0,
        Polarization::Vertical => 1,
        Polarization::CircularLeft => 2,
        Polarization::CircularRight => 3,
    };
    let rolloff = match p.rolloff {
        Rolloff::Rolloff35 => 0,
        Rolloff::Rolloff25 => 1,
        Rolloff::Rolloff20 => 2,
        Rolloff::Auto => 3,
    };
    let modulation = match p.modulation {
        Modulation::Qpsk => 1,
        Modulation::Psk8 => 2,
        Modulation::Qam16 => 3,
        _ => 0,
    };
    payload.push(
        (p.west_east_flag as u8) << 7
            | polarization << 5
            | rolloff << 3
            | ((p.system == SatSystem::DvbS2) as u8) << 2
            | modulation,
    );
    payload.extend(symbol_rate_bcd(p.symbol_rate, p.fec_inner));
    descriptor(tag::SATELLITE_DELIVERY, &payload)
}

pub fn terrestrial_delivery_descriptor(p: &TerrestrialParams, other_frequency: bool) -> Vec<u8> {
    let code_rate = |rate: CodeRate| match rate {
        CodeRate::Fec1_2 => 0,
        CodeRate::Fec2_3 => 1,
        CodeRate::Fec3_4 => 2,
        CodeRate::Fec5_6 => 3,
        CodeRate::Fec7_8 => 4,
        _ => 7,
    };
    let bandwidth = match p.bandwidth {
        Bandwidth::Mhz7 => 1,
        Bandwidth::Mhz6 => 2,
        Bandwidth::Mhz5 => 3,
        _ => 0,
    };
    let constellation = match p.constellation {
        Modulation::Qpsk => 0,
        Modulation::Qam16 => 1,
        Modulation::Qam64 => 2,
        _ => 3,
    };
    let hierarchy = match p.hierarchy {
        Hierarchy::Alpha1 => 1,
        Hierarchy::Alpha2 => 2,
        Hierarchy::Alpha4 => 3,
        _ => 0,
    };
    let guard = match p.guard_interval {
        GuardInterval::Guard1_32 => 0,
        GuardInterval::Guard1_16 => 1,
        GuardInterval::Guard1_8 => 2,
        _ => 3,
    };
    let transmission = match p.transmission_mode {
        TransmissionMode::Mode2k => 0,
        TransmissionMode::Mode8k => 1,
        TransmissionMode::Mode4k => 2,
        TransmissionMode::Auto => 3,
    };

    let mut payload = (p.frequency / 10).to_be_bytes().to_vec();
    payload.push(bandwidth << 5 | 0x1F);
    payload.push(constellation << 6 | hierarchy << 3 | code_rate(p.code_rate_hp));
    payload.push(
        code_rate(p.code_rate_lp) << 5 | guard << 3 | transmission << 1 | other_frequency as u8,
    );
    payload.extend_from_slice(&[0xFF; 4]);
    descriptor(tag::TERRESTRIAL_DELIVERY, &payload)
}

/// Frequency list with coding type 3 (terrestrial). Frequencies in Hz.
pub fn frequency_list_descriptor(frequencies: &[u32]) -> Vec<u8> {
    let mut payload = vec![0xFF];
    for f in frequencies {
        payload.extend_from_slice(&(f / 10).to_be_bytes());
    }
    descriptor(tag::FREQUENCY_LIST, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{DecodeContext, Descriptor};
    use crate::psi::PsiSection;
    use crate::table_id;

    #[test]
    fn test_builder_produces_valid_section() {
        let mut builder = SectionBuilder::new(0x42, 0x0401).version(7).section_number(1, 2);
        builder.body_mut().put_slice(&[0x12, 0x34]);
        let raw = builder.finish();

        let section = PsiSection::parse(&raw).unwrap();
        assert!(section.verify_crc(&raw));
        assert_eq!(section.header.table_id_extension, 0x0401);
        assert_eq!(section.header.version_number, 7);
        assert_eq!(section.header.section_number, 1);
        assert_eq!(section.header.last_section_number, 2);
        assert_eq!(section.data, &[0x12, 0x34]);
    }

    #[test]
    fn test_to_bcd() {
        assert_eq!(to_bcd(1177800, 8), vec![0x01, 0x17, 0x78, 0x00]);
        assert_eq!(to_bcd(192, 4), vec![0x01, 0x92]);
    }

    #[test]
    fn test_cable_descriptor_decodes_back() {
        let params = CableParams {
            frequency: 346_000_000,
            inversion: Inversion::Auto,
            symbol_rate: 6_900_000,
            fec_inner: CodeRate::Auto,
            modulation: Modulation::Qam64,
        };
        let raw = cable_delivery_descriptor(&params);
        let ctx = DecodeContext::new(table_id::NIT_ACTUAL, FrontendType::Cable);
        assert_eq!(
            Descriptor::decode(raw[0], &raw[2..], &ctx).unwrap(),
            Descriptor::CableDelivery(params)
        );
    }
}
