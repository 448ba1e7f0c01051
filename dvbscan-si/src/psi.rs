//! PSI section header parsing and CRC validation.

use crate::error::{ensure_len, Result, SiError};

/// Bytes before `section_length` starts counting.
pub const SECTION_PREFIX_LEN: usize = 3;
/// Bytes of the extended header of a long section (after the prefix).
const LONG_HEADER_LEN: usize = 5;
const CRC_LEN: usize = 4;

/// PSI section header (common to all PSI tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsiHeader {
    /// Table ID.
    pub table_id: u8,
    /// Section syntax indicator.
    pub section_syntax_indicator: bool,
    /// Section length (12 bits).
    pub section_length: u16,
    /// Table ID extension (for long sections).
    pub table_id_extension: u16,
    /// Version number (5 bits).
    pub version_number: u8,
    /// Current/next indicator.
    pub current_next_indicator: bool,
    /// Section number.
    pub section_number: u8,
    /// Last section number.
    pub last_section_number: u8,
}

impl PsiHeader {
    /// Reads `section_length` from the first three bytes of a buffer.
    ///
    /// Used by readers to check that one read produced exactly one section.
    pub fn peek_section_length(data: &[u8]) -> Option<usize> {
        if data.len() < SECTION_PREFIX_LEN {
            return None;
        }
        Some(((data[1] as usize & 0x0F) << 8) | data[2] as usize)
    }
}

/// A parsed PSI section.
#[derive(Debug, Clone)]
pub struct PsiSection<'a> {
    /// Section header.
    pub header: PsiHeader,
    /// Section data (after header, before CRC).
    pub data: &'a [u8],
    /// CRC32 value.
    pub crc32: u32,
}

impl<'a> PsiSection<'a> {
    /// Parse a PSI section from raw bytes starting at `table_id`.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        ensure_len(data, SECTION_PREFIX_LEN)?;

        let table_id = data[0];
        let section_syntax_indicator = data[1] & 0x80 != 0;
        let section_length = ((data[1] as u16 & 0x0F) << 8) | data[2] as u16;

        let total_length = SECTION_PREFIX_LEN + section_length as usize;
        if data.len() < total_length {
            return Err(SiError::LengthMismatch {
                declared: total_length,
                actual: data.len(),
            });
        }

        let header_end = if section_syntax_indicator {
            SECTION_PREFIX_LEN + LONG_HEADER_LEN
        } else {
            SECTION_PREFIX_LEN
        };
        if total_length < header_end + CRC_LEN {
            return Err(SiError::TooShort {
                need: header_end + CRC_LEN,
                actual: total_length,
            });
        }

        let header = if section_syntax_indicator {
            PsiHeader {
                table_id,
                section_syntax_indicator,
                section_length,
                table_id_extension: u16::from_be_bytes([data[3], data[4]]),
                version_number: (data[5] >> 1) & 0x1F,
                current_next_indicator: data[5] & 0x01 != 0,
                section_number: data[6],
                last_section_number: data[7],
            }
        } else {
            PsiHeader {
                table_id,
                section_syntax_indicator,
                section_length,
                table_id_extension: 0,
                version_number: 0,
                current_next_indicator: true,
                section_number: 0,
                last_section_number: 0,
            }
        };

        let crc_offset = total_length - CRC_LEN;
        let crc32 = u32::from_be_bytes([
            data[crc_offset],
            data[crc_offset + 1],
            data[crc_offset + 2],
            data[crc_offset + 3],
        ]);

        Ok(PsiSection {
            header,
            data: &data[header_end..crc_offset],
            crc32,
        })
    }

    /// Parse a section and check that it belongs to one of `table_ids`.
    pub fn parse_expecting(data: &'a [u8], table_ids: &[u8]) -> Result<Self> {
        let section = Self::parse(data)?;
        if !table_ids.contains(&section.header.table_id) {
            return Err(SiError::UnexpectedTable(section.header.table_id));
        }
        Ok(section)
    }

    /// Verify CRC32 of the section.
    pub fn verify_crc(&self, full_data: &[u8]) -> bool {
        let total_length = self.total_length();
        if full_data.len() < total_length {
            return false;
        }
        crc32_mpeg2(&full_data[..total_length - CRC_LEN]) == self.crc32
    }

    /// Get the total section length including header and CRC.
    pub fn total_length(&self) -> usize {
        SECTION_PREFIX_LEN + self.header.section_length as usize
    }
}

/// Calculate CRC32 for MPEG-2 (polynomial 0x04C11DB7).
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    static CRC_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = (i as u32) << 24;
            let mut j = 0;
            while j < 8 {
                if crc & 0x80000000 != 0 {
                    crc = (crc << 1) ^ 0x04C11DB7;
                } else {
                    crc <<= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFFFFFFu32;
    for &byte in data {
        let index = ((crc >> 24) ^ byte as u32) as usize;
        crc = (crc << 8) ^ CRC_TABLE[index];
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_empty() {
        assert_eq!(crc32_mpeg2(&[]), 0xFFFFFFFF);
    }

    #[test]
    fn test_crc32_of_section_with_crc_is_zero() {
        // A complete section including its own CRC always sums to zero.
        let mut data = vec![0x00, 0xB0, 0x0D, 0x04, 0x01, 0xC1, 0x00, 0x00, 0x00, 0x65, 0xE1, 0xF4];
        let crc = crc32_mpeg2(&data);
        data.extend_from_slice(&crc.to_be_bytes());
        assert_eq!(crc32_mpeg2(&data), 0);
    }

    #[test]
    fn test_parse_long_header() {
        let mut data = vec![0x42, 0xF0, 0x0C, 0x12, 0x34, 0xC7, 0x01, 0x02, 0xAA, 0xBB, 0xCC];
        let crc = crc32_mpeg2(&data);
        data.extend_from_slice(&crc.to_be_bytes());
        data.push(0xFF); // trailing stuffing is ignored

        let section = PsiSection::parse(&data).unwrap();
        assert_eq!(section.header.table_id, 0x42);
        assert_eq!(section.header.table_id_extension, 0x1234);
        assert_eq!(section.header.version_number, 3);
        assert!(section.header.current_next_indicator);
        assert_eq!(section.header.section_number, 1);
        assert_eq!(section.header.last_section_number, 2);
        assert_eq!(section.data, &[0xAA, 0xBB, 0xCC]);
        assert_eq!(section.total_length(), 15);
        assert!(section.verify_crc(&data));
    }

    #[test]
    fn test_parse_truncated() {
        let data = [0x00, 0xB0, 0x0D, 0x00, 0x01];
        assert_eq!(
            PsiSection::parse(&data).unwrap_err(),
            SiError::LengthMismatch {
                declared: 16,
                actual: 5
            }
        );
    }

    #[test]
    fn test_parse_expecting_rejects_other_table() {
        let mut data = vec![0x02, 0xB0, 0x09, 0x00, 0x01, 0xC1, 0x00, 0x00];
        let crc = crc32_mpeg2(&data);
        data.extend_from_slice(&crc.to_be_bytes());
        assert_eq!(
            PsiSection::parse_expecting(&data, &[0x00]).unwrap_err(),
            SiError::UnexpectedTable(0x02)
        );
        assert!(PsiSection::parse_expecting(&data, &[0x02]).is_ok());
    }

    #[test]
    fn test_peek_section_length() {
        assert_eq!(PsiHeader::peek_section_length(&[0x40, 0xF1, 0x23]), Some(0x123));
        assert_eq!(PsiHeader::peek_section_length(&[0x40]), None);
    }
}
