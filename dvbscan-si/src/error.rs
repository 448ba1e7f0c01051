//! Error types for section and descriptor decoding.

use thiserror::Error;

/// A section that cannot be decoded.
///
/// Every variant means the section is malformed: the caller drops the
/// section, logs the error and carries on with the next one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SiError {
    /// Buffer is shorter than the fixed part being read.
    #[error("Section too short: need {need} bytes, got {actual}")]
    TooShort { need: usize, actual: usize },

    /// `section_length` disagrees with the number of bytes available.
    #[error("Section length mismatch: header declares {declared} bytes, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Section was handed to the decoder of another table.
    #[error("Unexpected table id: 0x{0:02X}")]
    UnexpectedTable(u8),

    /// A descriptor declares a zero payload length.
    #[error("Zero-length descriptor (tag 0x{0:02X})")]
    ZeroLengthDescriptor(u8),

    /// A descriptor runs past the end of its loop.
    #[error("Descriptor 0x{tag:02X} overruns its loop: {length} bytes with {remaining} left")]
    DescriptorOverrun {
        tag: u8,
        length: usize,
        remaining: usize,
    },

    /// A known descriptor is shorter than its fixed layout.
    #[error("Descriptor 0x{tag:02X} too short: {actual} bytes")]
    DescriptorTooShort { tag: u8, actual: usize },

    /// A loop length field points past the end of the section body.
    #[error("Loop length {length} exceeds the {available} bytes left in the section")]
    LoopOverrun { length: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, SiError>;

/// Fails with [`SiError::TooShort`] unless `data` holds at least `need` bytes.
pub(crate) fn ensure_len(data: &[u8], need: usize) -> Result<()> {
    if data.len() < need {
        return Err(SiError::TooShort {
            need,
            actual: data.len(),
        });
    }
    Ok(())
}
