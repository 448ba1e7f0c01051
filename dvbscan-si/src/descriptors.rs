//! Descriptor parsing for PSI/SI tables.
//!
//! Every descriptor loop is walked with [`DescriptorLoop`] and every entry is
//! passed through [`Descriptor::decode`]. Dispatch is total: tags that are
//! unknown, or that do not apply to the current table or delivery system,
//! come back as [`Descriptor::Skipped`].

use crate::error::{Result, SiError};
use crate::text::{decode_dvb_text, DvbText};
use crate::types::*;
use crate::vct::{parse_extended_channel_name, ServiceLocation};
use crate::{descriptor_tag as tag, table_id};

/// Where a descriptor loop comes from, used to decide which tags apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeContext {
    /// Table the loop belongs to.
    pub table_id: u8,
    /// Delivery system of the frontend the section was received on.
    pub frontend: Option<FrontendType>,
    /// Spectral inversion applied to transponders built from delivery descriptors.
    pub inversion: Inversion,
}

impl DecodeContext {
    pub fn new(table_id: u8, frontend: FrontendType) -> Self {
        DecodeContext {
            table_id,
            frontend: Some(frontend),
            inversion: Inversion::Auto,
        }
    }

    /// Context for tables that carry no delivery system descriptors.
    pub fn for_table(table_id: u8) -> Self {
        DecodeContext {
            table_id,
            frontend: None,
            inversion: Inversion::Auto,
        }
    }

    fn delivers(&self, frontend: FrontendType) -> bool {
        self.is_nit() && self.frontend == Some(frontend)
    }

    fn is_nit(&self) -> bool {
        self.table_id == table_id::NIT_ACTUAL || self.table_id == table_id::NIT_OTHER
    }

    fn is_vct(&self) -> bool {
        self.table_id == table_id::TVCT || self.table_id == table_id::CVCT
    }
}

/// Iterator over `(tag, payload)` pairs of a descriptor loop.
///
/// Yields one error and then stops when a descriptor is empty or runs past
/// the end of the loop.
#[derive(Debug, Clone)]
pub struct DescriptorLoop<'a> {
    data: &'a [u8],
    failed: bool,
}

impl<'a> DescriptorLoop<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        DescriptorLoop {
            data,
            failed: false,
        }
    }
}

impl<'a> Iterator for DescriptorLoop<'a> {
    type Item = Result<(u8, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.data.len() < 2 {
            return None;
        }

        let tag = self.data[0];
        let length = self.data[1] as usize;
        let remaining = self.data.len() - 2;

        if length == 0 {
            self.failed = true;
            return Some(Err(SiError::ZeroLengthDescriptor(tag)));
        }
        if length > remaining {
            self.failed = true;
            return Some(Err(SiError::DescriptorOverrun {
                tag,
                length,
                remaining,
            }));
        }

        let payload = &self.data[2..2 + length];
        self.data = &self.data[2 + length..];
        Some(Ok((tag, payload)))
    }
}

/// Find a specific descriptor in a descriptor loop.
pub fn find_descriptor(data: &[u8], wanted: u8) -> Result<Option<&[u8]>> {
    for entry in DescriptorLoop::new(data) {
        let (tag, payload) = entry?;
        if tag == wanted {
            return Ok(Some(payload));
        }
    }
    Ok(None)
}

/// Service descriptor (0x48).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Service type.
    pub service_type: u8,
    /// Service provider name.
    pub provider_name: DvbText,
    /// Service name.
    pub service_name: DvbText,
}

impl ServiceDescriptor {
    /// Parse a service descriptor payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let too_short = || SiError::DescriptorTooShort {
            tag: tag::SERVICE,
            actual: data.len(),
        };
        if data.len() < 3 {
            return Err(too_short());
        }

        let service_type = data[0];
        let provider_name_length = data[1] as usize;
        let service_name_offset = 2 + provider_name_length;
        if data.len() < service_name_offset + 1 {
            return Err(too_short());
        }
        let provider_name = decode_dvb_text(&data[2..service_name_offset]);

        let service_name_length = data[service_name_offset] as usize;
        let service_name_end = service_name_offset + 1 + service_name_length;
        if data.len() < service_name_end {
            return Err(too_short());
        }
        let service_name = decode_dvb_text(&data[service_name_offset + 1..service_name_end]);

        Ok(ServiceDescriptor {
            service_type,
            provider_name,
            service_name,
        })
    }
}

/// A decoded descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    NetworkName(DvbText),
    Service(ServiceDescriptor),
    /// CA system id from a conditional access descriptor.
    Ca(u16),
    CaIdentifier(Vec<u16>),
    /// First ISO 639 language code.
    Language(String),
    Teletext,
    Subtitling,
    Ac3,
    EnhancedAc3,
    SatelliteDelivery(SatelliteParams),
    /// The S2 descriptor only tells that the transponder is second generation.
    S2SatelliteDelivery,
    CableDelivery(CableParams),
    TerrestrialDelivery {
        params: TerrestrialParams,
        other_frequency: bool,
    },
    /// Alternate centre frequencies, empty when the coding type is not handled.
    FrequencyList(Vec<u32>),
    ServiceLocation(ServiceLocation),
    ExtendedChannelName(Option<String>),
    /// Known but not applicable here, or unknown.
    Skipped(u8),
}

impl Descriptor {
    /// Decode one descriptor payload for the given table and frontend.
    pub fn decode(descriptor_tag: u8, payload: &[u8], ctx: &DecodeContext) -> Result<Self> {
        let too_short = |need: usize| -> Result<()> {
            if payload.len() < need {
                return Err(SiError::DescriptorTooShort {
                    tag: descriptor_tag,
                    actual: payload.len(),
                });
            }
            Ok(())
        };

        let descriptor = match descriptor_tag {
            tag::NETWORK_NAME => Descriptor::NetworkName(decode_dvb_text(payload)),
            tag::SERVICE => Descriptor::Service(ServiceDescriptor::parse(payload)?),
            tag::CA if payload.len() >= 4 => {
                Descriptor::Ca(u16::from_be_bytes([payload[0], payload[1]]))
            }
            tag::CA_IDENTIFIER => Descriptor::CaIdentifier(
                payload
                    .chunks_exact(2)
                    .map(|id| u16::from_be_bytes([id[0], id[1]]))
                    .collect(),
            ),
            tag::ISO_639_LANGUAGE => {
                too_short(3)?;
                Descriptor::Language(payload[..3].iter().map(|&b| b as char).collect())
            }
            tag::TELETEXT => Descriptor::Teletext,
            tag::SUBTITLING => Descriptor::Subtitling,
            tag::AC3 => Descriptor::Ac3,
            tag::ENHANCED_AC3 => Descriptor::EnhancedAc3,
            tag::SATELLITE_DELIVERY if ctx.delivers(FrontendType::Satellite) => {
                too_short(11)?;
                Descriptor::SatelliteDelivery(parse_satellite_delivery(payload, ctx.inversion))
            }
            tag::S2_SATELLITE_DELIVERY
                if ctx.delivers(FrontendType::Satellite) =>
            {
                Descriptor::S2SatelliteDelivery
            }
            tag::CABLE_DELIVERY if ctx.delivers(FrontendType::Cable) => {
                too_short(11)?;
                Descriptor::CableDelivery(parse_cable_delivery(payload, ctx.inversion))
            }
            tag::TERRESTRIAL_DELIVERY if ctx.delivers(FrontendType::Terrestrial) => {
                too_short(7)?;
                let (params, other_frequency) =
                    parse_terrestrial_delivery(payload, ctx.inversion);
                Descriptor::TerrestrialDelivery {
                    params,
                    other_frequency,
                }
            }
            tag::FREQUENCY_LIST if ctx.is_nit() => {
                Descriptor::FrequencyList(parse_frequency_list(payload))
            }
            tag::SERVICE_LOCATION if ctx.is_vct() => {
                Descriptor::ServiceLocation(ServiceLocation::parse(payload)?)
            }
            tag::EXTENDED_CHANNEL_NAME if ctx.is_vct() => {
                Descriptor::ExtendedChannelName(parse_extended_channel_name(payload))
            }
            other => Descriptor::Skipped(other),
        };
        Ok(descriptor)
    }
}

/// Walk a loop and decode every descriptor in it.
pub fn decode_loop(data: &[u8], ctx: &DecodeContext) -> Result<Vec<Descriptor>> {
    DescriptorLoop::new(data)
        .map(|entry| entry.and_then(|(t, payload)| Descriptor::decode(t, payload, ctx)))
        .collect()
}

/// Convert BCD bytes to u32.
pub(crate) fn bcd_to_u32(data: &[u8]) -> u32 {
    let mut result = 0u32;
    for &byte in data {
        let high = (byte >> 4) as u32;
        let low = (byte & 0x0F) as u32;
        result = result * 100 + high * 10 + low;
    }
    result
}

fn fec_inner(code: u8) -> CodeRate {
    match code {
        1 => CodeRate::Fec1_2,
        2 => CodeRate::Fec2_3,
        3 => CodeRate::Fec3_4,
        4 => CodeRate::Fec5_6,
        5 => CodeRate::Fec7_8,
        6 => CodeRate::Fec8_9,
        7 => CodeRate::Fec3_5,
        8 => CodeRate::Fec4_5,
        9 => CodeRate::Fec9_10,
        15 => CodeRate::None,
        _ => CodeRate::Auto,
    }
}

/// Symbol rate: 7 BCD digits in units of 100 symbols/s.
fn symbol_rate(data: &[u8]) -> u32 {
    bcd_to_u32(&[data[0], data[1], data[2], data[3] & 0xF0]) * 10
}

fn parse_satellite_delivery(p: &[u8], inversion: Inversion) -> SatelliteParams {
    let flags = p[6];

    let polarization = match (flags & 0x60) >> 5 {
        0 => Polarization::Horizontal,
        1 => Polarization::Vertical,
        2 => Polarization::CircularLeft,
        _ => Polarization::CircularRight,
    };
    let rolloff = match (flags & 0x18) >> 3 {
        0 => Rolloff::Rolloff35,
        1 => Rolloff::Rolloff25,
        2 => Rolloff::Rolloff20,
        _ => Rolloff::Auto,
    };
    let modulation = match flags & 0x03 {
        1 => Modulation::Qpsk,
        2 => Modulation::Psk8,
        3 => Modulation::Qam16,
        _ => Modulation::QamAuto,
    };
    let fec_inner = fec_inner(p[10] & 0x0F);

    // Some networks signal S2-only parameters with the modulation system bit cleared.
    let second_generation = flags & 0x04 != 0
        || modulation == Modulation::Psk8
        || matches!(rolloff, Rolloff::Rolloff25 | Rolloff::Rolloff20)
        || matches!(fec_inner, CodeRate::Fec9_10 | CodeRate::Fec3_5);

    SatelliteParams {
        frequency: bcd_to_u32(&p[0..4]) * 10,
        inversion,
        symbol_rate: symbol_rate(&p[7..11]),
        fec_inner,
        polarization,
        system: if second_generation {
            SatSystem::DvbS2
        } else {
            SatSystem::DvbS
        },
        modulation,
        rolloff,
        pilot: Pilot::Auto,
        orbital_position: bcd_to_u32(&p[4..6]) as u16,
        west_east_flag: flags & 0x80 != 0,
    }
}

fn parse_cable_delivery(p: &[u8], inversion: Inversion) -> CableParams {
    let modulation = match p[6] {
        1 => Modulation::Qam16,
        2 => Modulation::Qam32,
        3 => Modulation::Qam64,
        4 => Modulation::Qam128,
        5 => Modulation::Qam256,
        _ => Modulation::QamAuto,
    };

    CableParams {
        frequency: bcd_to_u32(&p[0..4]) * 100,
        inversion,
        symbol_rate: symbol_rate(&p[7..11]),
        fec_inner: fec_inner(p[10] & 0x0F),
        modulation,
    }
}

fn dvbt_code_rate(code: u8) -> CodeRate {
    match code {
        0 => CodeRate::Fec1_2,
        1 => CodeRate::Fec2_3,
        2 => CodeRate::Fec3_4,
        3 => CodeRate::Fec5_6,
        4 => CodeRate::Fec7_8,
        _ => CodeRate::Auto,
    }
}

fn parse_terrestrial_delivery(p: &[u8], inversion: Inversion) -> (TerrestrialParams, bool) {
    let bandwidth = match p[4] >> 5 {
        1 => Bandwidth::Mhz7,
        2 => Bandwidth::Mhz6,
        3 => Bandwidth::Mhz5,
        _ => Bandwidth::Mhz8,
    };
    let constellation = match p[5] >> 6 {
        0 => Modulation::Qpsk,
        1 => Modulation::Qam16,
        2 => Modulation::Qam64,
        _ => Modulation::QamAuto,
    };
    let hierarchy = match ((p[5] >> 3) & 0x07) % 4 {
        0 => Hierarchy::None,
        1 => Hierarchy::Alpha1,
        2 => Hierarchy::Alpha2,
        _ => Hierarchy::Alpha4,
    };
    let code_rate_lp = if hierarchy == Hierarchy::None {
        CodeRate::None
    } else {
        dvbt_code_rate((p[6] >> 5) & 0x07)
    };
    let guard_interval = match (p[6] >> 3) & 0x03 {
        0 => GuardInterval::Guard1_32,
        1 => GuardInterval::Guard1_16,
        2 => GuardInterval::Guard1_8,
        _ => GuardInterval::Guard1_4,
    };
    let transmission_mode = match (p[6] >> 1) & 0x03 {
        0 => TransmissionMode::Mode2k,
        1 => TransmissionMode::Mode8k,
        2 => TransmissionMode::Mode4k,
        _ => TransmissionMode::Auto,
    };

    let params = TerrestrialParams {
        frequency: u32::from_be_bytes([p[0], p[1], p[2], p[3]]).wrapping_mul(10),
        inversion,
        bandwidth,
        code_rate_hp: dvbt_code_rate(p[5] & 0x07),
        code_rate_lp,
        constellation,
        transmission_mode,
        guard_interval,
        hierarchy,
    };
    (params, p[6] & 0x01 != 0)
}

/// Only coding type 3 (terrestrial, 10 Hz units) is decoded.
fn parse_frequency_list(p: &[u8]) -> Vec<u32> {
    if p.len() < 5 || p[0] & 0x03 != 3 {
        return Vec::new();
    }
    p[1..]
        .chunks_exact(4)
        .map(|f| u32::from_be_bytes([f[0], f[1], f[2], f[3]]).wrapping_mul(10))
        .collect()
}
