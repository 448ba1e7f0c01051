//! PAT (Program Association Table) parsing.
//!
//! The PAT is transmitted on PID 0x0000 and contains a list of programs
//! with their PMT PIDs.

use bytes::{BufMut, Bytes, BytesMut};

use crate::encode::SectionBuilder;
use crate::error::{Result, SiError};
use crate::psi::PsiSection;
use crate::table_id;

/// A single PAT entry (program number and PMT PID).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatEntry {
    /// Program number (service id).
    pub program_number: u16,
    /// PID of the PMT for this program.
    pub pid: u16,
}

/// Parsed PAT (Program Association Table).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatTable {
    /// Transport stream ID.
    pub transport_stream_id: u16,
    /// Version number.
    pub version_number: u8,
    /// Programs, program number 0 excluded.
    pub programs: Vec<PatEntry>,
}

impl PatTable {
    /// Parse a PAT from a PSI section.
    pub fn parse(section: &PsiSection) -> Result<Self> {
        if section.header.table_id != table_id::PAT {
            return Err(SiError::UnexpectedTable(section.header.table_id));
        }

        let data = section.data;
        if data.len() % 4 != 0 {
            return Err(SiError::LengthMismatch {
                declared: data.len() / 4 * 4,
                actual: data.len(),
            });
        }

        let programs = data
            .chunks_exact(4)
            .map(|chunk| PatEntry {
                program_number: u16::from_be_bytes([chunk[0], chunk[1]]),
                pid: u16::from_be_bytes([chunk[2] & 0x1F, chunk[3]]),
            })
            // program 0 points at the network PID, not a service
            .filter(|entry| entry.program_number != 0)
            .collect();

        Ok(PatTable {
            transport_stream_id: section.header.table_id_extension,
            version_number: section.header.version_number,
            programs,
        })
    }

    /// Get PMT PID for a specific program number.
    pub fn get_pmt_pid(&self, program_number: u16) -> Option<u16> {
        self.programs
            .iter()
            .find(|p| p.program_number == program_number)
            .map(|p| p.pid)
    }

    /// Encode as a single section.
    pub fn encode(&self) -> Bytes {
        let mut builder =
            SectionBuilder::new(table_id::PAT, self.transport_stream_id).version(self.version_number);
        let body: &mut BytesMut = builder.body_mut();
        for entry in &self.programs {
            body.put_u16(entry.program_number);
            body.put_u16(0xE000 | (entry.pid & 0x1FFF));
        }
        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psi::crc32_mpeg2;

    #[test]
    fn test_parse_pat() {
        let mut data = vec![
            0x00, 0xB0, 0x15, // table_id, section_length = 21
            0x04, 0x01, // transport_stream_id
            0xC5, 0x00, 0x00, // version 2, section 0/0
            0x00, 0x00, 0xE0, 0x10, // program 0 -> NIT PID
            0x00, 0x65, 0xE1, 0xF4, // program 101 -> PID 500
            0x00, 0x66, 0xE2, 0x58, // program 102 -> PID 600
        ];
        let crc = crc32_mpeg2(&data);
        data.extend_from_slice(&crc.to_be_bytes());

        let section = PsiSection::parse(&data).unwrap();
        let pat = PatTable::parse(&section).unwrap();
        assert_eq!(pat.transport_stream_id, 0x0401);
        assert_eq!(pat.version_number, 2);
        assert_eq!(
            pat.programs,
            vec![
                PatEntry {
                    program_number: 101,
                    pid: 500
                },
                PatEntry {
                    program_number: 102,
                    pid: 600
                },
            ]
        );
        assert_eq!(pat.get_pmt_pid(102), Some(600));
        assert_eq!(pat.get_pmt_pid(103), None);
    }

    #[test]
    fn test_parse_pat_rejects_other_table() {
        let pmt = PatTable::default().encode();
        let mut raw = pmt.to_vec();
        raw[0] = table_id::PMT;
        let section = PsiSection::parse(&raw).unwrap();
        assert_eq!(
            PatTable::parse(&section).unwrap_err(),
            SiError::UnexpectedTable(table_id::PMT)
        );
    }

    #[test]
    fn test_encode_masks_pid() {
        let pat = PatTable {
            transport_stream_id: 1,
            version_number: 0,
            programs: vec![PatEntry {
                program_number: 1,
                pid: 0xFFFF,
            }],
        };
        let raw = pat.encode();
        let decoded = PatTable::parse(&PsiSection::parse(&raw).unwrap()).unwrap();
        assert_eq!(decoded.programs[0].pid, 0x1FFF);
    }
}
