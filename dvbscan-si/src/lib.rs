//! Service information decoding for dvbscan.
//!
//! This crate turns raw MPEG-2 sections, as delivered by a kernel section
//! filter, into typed tables. It knows nothing about tuners or devices.
//!
//! # Section Format
//!
//! ```text
//! +----------+--------+-----------+---------+---------+---------+-------+
//! | table_id | length | table_ext | version | sec_num | last_no | body  | CRC32
//! |  8 bits  | 12 bit |  16 bits  |  5 bits | 8 bits  | 8 bits  |  ...  | 32
//! +----------+--------+-----------+---------+---------+---------+-------+
//! ```
//!
//! # Supported Tables
//! - PAT (Program Association Table) - PID 0x0000
//! - PMT (Program Map Table) - PIDs from the PAT
//! - NIT (Network Information Table, actual and other) - PID 0x0010
//! - SDT (Service Description Table, actual) - PID 0x0011
//! - VCT (ATSC Virtual Channel Table, terrestrial and cable) - PID 0x1FFB
//!
//! # Example
//!
//! ```rust
//! use dvbscan_si::{PatEntry, PatTable, PsiSection};
//!
//! let pat = PatTable {
//!     transport_stream_id: 0x0401,
//!     version_number: 3,
//!     programs: vec![PatEntry { program_number: 101, pid: 500 }],
//! };
//! let raw = pat.encode();
//!
//! let section = PsiSection::parse(&raw).unwrap();
//! assert!(section.verify_crc(&raw));
//! let decoded = PatTable::parse(&section).unwrap();
//! assert_eq!(decoded.programs[0].pid, 500);
//! ```

pub mod descriptors;
pub mod encode;
pub mod error;
pub mod nit;
pub mod pat;
pub mod pmt;
pub mod psi;
pub mod sdt;
pub mod text;
pub mod types;
pub mod vct;

pub use descriptors::{DecodeContext, Descriptor, DescriptorLoop, ServiceDescriptor};
pub use encode::SectionBuilder;
pub use error::{Result, SiError};
pub use nit::{NitTable, NitTransportStream};
pub use pat::{PatEntry, PatTable};
pub use pmt::{PmtStream, PmtTable, StreamKind};
pub use psi::{crc32_mpeg2, PsiHeader, PsiSection};
pub use sdt::{SdtService, SdtTable};
pub use text::{decode_dvb_text, DvbText};
pub use types::*;
pub use vct::{ServiceLocation, ServiceLocationElement, VctChannel, VctTable};

/// Well-known PIDs.
pub mod pid {
    /// Program Association Table PID.
    pub const PAT: u16 = 0x0000;
    /// Conditional Access Table PID.
    pub const CAT: u16 = 0x0001;
    /// Transport Stream Description Table PID.
    pub const TSDT: u16 = 0x0002;
    /// Network Information Table PID.
    pub const NIT: u16 = 0x0010;
    /// Service Description Table PID.
    pub const SDT: u16 = 0x0011;
    /// Event Information Table PID.
    pub const EIT: u16 = 0x0012;
    /// Time and Date Table PID.
    pub const TDT: u16 = 0x0014;
    /// ATSC PSIP base PID (MGT/TVCT/CVCT).
    pub const PSIP: u16 = 0x1FFB;
    /// Null packet PID (stuffing).
    pub const NULL: u16 = 0x1FFF;
}

/// Table IDs for PSI/SI/PSIP tables.
pub mod table_id {
    /// Program Association Section.
    pub const PAT: u8 = 0x00;
    /// Conditional Access Section.
    pub const CAT: u8 = 0x01;
    /// Program Map Section.
    pub const PMT: u8 = 0x02;
    /// Transport Stream Description Section.
    pub const TSDT: u8 = 0x03;
    /// Network Information Section - actual.
    pub const NIT_ACTUAL: u8 = 0x40;
    /// Network Information Section - other.
    pub const NIT_OTHER: u8 = 0x41;
    /// Service Description Section - actual.
    pub const SDT_ACTUAL: u8 = 0x42;
    /// Service Description Section - other.
    pub const SDT_OTHER: u8 = 0x46;
    /// Bouquet Association Section.
    pub const BAT: u8 = 0x4A;
    /// Event Information Section - actual, present/following.
    pub const EIT_ACTUAL: u8 = 0x4E;
    /// Event Information Section - other, present/following.
    pub const EIT_OTHER: u8 = 0x4F;
    /// First EIT schedule table id, actual.
    pub const EIT_SCHEDULE_ACTUAL_FIRST: u8 = 0x50;
    /// Last EIT schedule table id, actual.
    pub const EIT_SCHEDULE_ACTUAL_LAST: u8 = 0x5F;
    /// First EIT schedule table id, other.
    pub const EIT_SCHEDULE_OTHER_FIRST: u8 = 0x60;
    /// Last EIT schedule table id, other.
    pub const EIT_SCHEDULE_OTHER_LAST: u8 = 0x6F;
    /// Time and Date Section.
    pub const TDT: u8 = 0x70;
    /// Time Offset Section.
    pub const TOT: u8 = 0x73;
    /// ATSC Terrestrial Virtual Channel Table.
    pub const TVCT: u8 = 0xC8;
    /// ATSC Cable Virtual Channel Table.
    pub const CVCT: u8 = 0xC9;
}

/// Descriptor tags.
pub mod descriptor_tag {
    /// ISO 639 language descriptor.
    pub const ISO_639_LANGUAGE: u8 = 0x0A;
    /// Conditional access descriptor.
    pub const CA: u8 = 0x09;
    /// Network name descriptor.
    pub const NETWORK_NAME: u8 = 0x40;
    /// Service list descriptor.
    pub const SERVICE_LIST: u8 = 0x41;
    /// Satellite delivery system descriptor.
    pub const SATELLITE_DELIVERY: u8 = 0x43;
    /// Cable delivery system descriptor.
    pub const CABLE_DELIVERY: u8 = 0x44;
    /// Service descriptor.
    pub const SERVICE: u8 = 0x48;
    /// CA identifier descriptor.
    pub const CA_IDENTIFIER: u8 = 0x53;
    /// Teletext descriptor.
    pub const TELETEXT: u8 = 0x56;
    /// Subtitling descriptor.
    pub const SUBTITLING: u8 = 0x59;
    /// Terrestrial delivery system descriptor.
    pub const TERRESTRIAL_DELIVERY: u8 = 0x5A;
    /// Frequency list descriptor.
    pub const FREQUENCY_LIST: u8 = 0x62;
    /// AC-3 descriptor.
    pub const AC3: u8 = 0x6A;
    /// S2 satellite delivery system descriptor.
    pub const S2_SATELLITE_DELIVERY: u8 = 0x79;
    /// Enhanced AC-3 descriptor.
    pub const ENHANCED_AC3: u8 = 0x7A;
    /// ATSC extended channel name descriptor.
    pub const EXTENDED_CHANNEL_NAME: u8 = 0xA0;
    /// ATSC service location descriptor.
    pub const SERVICE_LOCATION: u8 = 0xA1;
}

/// Stream types found in the PMT elementary stream loop.
pub mod stream_type {
    /// MPEG-1 Video.
    pub const MPEG1_VIDEO: u8 = 0x01;
    /// MPEG-2 Video.
    pub const MPEG2_VIDEO: u8 = 0x02;
    /// MPEG-1 Audio.
    pub const MPEG1_AUDIO: u8 = 0x03;
    /// MPEG-2 Audio.
    pub const MPEG2_AUDIO: u8 = 0x04;
    /// Private sections.
    pub const PRIVATE_SECTIONS: u8 = 0x05;
    /// PES packets containing private data.
    pub const PRIVATE_PES: u8 = 0x06;
    /// AAC audio (ADTS).
    pub const AAC_ADTS: u8 = 0x0F;
    /// AAC audio (LATM).
    pub const AAC_LATM: u8 = 0x11;
    /// H.264/AVC Video.
    pub const H264_VIDEO: u8 = 0x1B;
    /// ATSC AC-3 audio.
    pub const ATSC_AC3: u8 = 0x81;
}
