//! Error types for the scanner.

use std::io;
use std::path::PathBuf;

use dvbscan_si::FrontendType;
use thiserror::Error;

/// Errors that end a scan.
///
/// Malformed sections, missing signal and filter timeouts are not errors:
/// they are logged and the scan carries on.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A device node could not be opened.
    #[error("Failed to open {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A control ioctl failed outright.
    #[error("{operation} failed: {source}")]
    Device {
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    /// No frontend matching the requested delivery system was found.
    #[error("No {0} frontend found")]
    NoFrontend(FrontendType),

    /// The selected frontend cannot scan the requested delivery system.
    #[error("Frontend is {found}, but a {wanted} scan was requested")]
    FrontendMismatch {
        found: FrontendType,
        wanted: FrontendType,
    },

    /// Neither the sweep nor the initial tuning data produced a usable transponder.
    #[error("Couldn't get any working frequency/transponder")]
    NothingToScan,

    /// Configuration file could not be read or parsed.
    #[error("Failed to load config file {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Invalid option combination.
    #[error("Invalid setting: {0}")]
    Setting(String),

    /// Initial tuning data could not be parsed.
    #[error("Invalid initial tuning data at line {line}: {message}")]
    TuningData { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Tags an I/O failure with the device operation that caused it.
pub(crate) trait DeviceResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T, ScanError>;
}

impl<T> DeviceResultExt<T> for io::Result<T> {
    fn during(self, operation: &'static str) -> Result<T, ScanError> {
        self.map_err(|source| ScanError::Device { operation, source })
    }
}
