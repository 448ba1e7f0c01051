//! Frontend and demux access.
//!
//! The scanner only talks to hardware through the [`Frontend`] and
//! [`SectionSource`] traits. On Linux they are backed by the DVB API
//! character devices, elsewhere opening a device fails with
//! `ErrorKind::Unsupported`.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use dvbscan_si::FrontendType;

pub use self::dtv::{DtvCommand, DtvProperty};
#[cfg(target_os = "linux")]
pub use self::linux::{probe_frontends, LinuxDemux, LinuxFrontend};
#[cfg(not(target_os = "linux"))]
pub use self::unsupported::{probe_frontends, LinuxDemux, LinuxFrontend};

pub mod diseqc;
pub mod dtv;
pub mod lnb;
#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(target_os = "linux"))]
mod unsupported;

/// `fe_caps` bit set reported by `FE_GET_INFO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrontendCaps(pub u32);

impl FrontendCaps {
    pub const INVERSION_AUTO: u32 = 0x1;
    pub const FEC_AUTO: u32 = 0x200;
    pub const QAM_AUTO: u32 = 0x10000;
    pub const TRANSMISSION_MODE_AUTO: u32 = 0x20000;
    pub const BANDWIDTH_AUTO: u32 = 0x40000;
    pub const GUARD_INTERVAL_AUTO: u32 = 0x80000;
    pub const HIERARCHY_AUTO: u32 = 0x100000;
    pub const VSB_8: u32 = 0x200000;
    pub const VSB_16: u32 = 0x400000;
    pub const MODULATION_2G: u32 = 0x10000000;

    pub fn has(self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}

/// `fe_status` bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrontendStatus(pub u32);

impl FrontendStatus {
    pub const HAS_SIGNAL: u32 = 0x01;
    pub const HAS_CARRIER: u32 = 0x02;
    pub const HAS_VITERBI: u32 = 0x04;
    pub const HAS_SYNC: u32 = 0x08;
    pub const HAS_LOCK: u32 = 0x10;

    pub fn has_lock(self) -> bool {
        self.0 & Self::HAS_LOCK != 0
    }

    /// Compact status flags as printed in verbose output.
    pub fn flags(self) -> String {
        [
            (Self::HAS_SIGNAL, 'S'),
            (Self::HAS_CARRIER, 'C'),
            (Self::HAS_VITERBI, 'V'),
            (Self::HAS_SYNC, 'Y'),
            (Self::HAS_LOCK, 'L'),
        ]
        .iter()
        .map(|&(bit, c)| if self.0 & bit != 0 { c } else { ' ' })
        .collect()
    }
}

/// What `FE_GET_INFO` and `DTV_API_VERSION` report about a frontend.
///
/// Frequencies are in kHz for satellite frontends and Hz otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendInfo {
    pub name: String,
    pub frontend_type: FrontendType,
    pub frequency_min: u32,
    pub frequency_max: u32,
    pub frequency_stepsize: u32,
    pub symbol_rate_min: u32,
    pub symbol_rate_max: u32,
    pub caps: FrontendCaps,
    /// `major << 8 | minor`.
    pub api_version: u16,
}

impl FrontendInfo {
    pub fn api_version_string(&self) -> String {
        format!("{}.{}", self.api_version >> 8, self.api_version & 0xFF)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecVoltage {
    V13,
    V18,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneBurst {
    A,
    B,
}

/// Control side of a tuner.
pub trait Frontend {
    fn info(&self) -> &FrontendInfo;
    /// Programs a property sequence. Ends with `DTV_TUNE`.
    fn set_properties(&mut self, properties: &[DtvProperty]) -> io::Result<()>;
    fn read_status(&mut self) -> io::Result<FrontendStatus>;
    fn signal_strength(&mut self) -> io::Result<u16>;
    fn snr(&mut self) -> io::Result<u16>;
    fn set_tone(&mut self, on: bool) -> io::Result<()>;
    fn set_voltage(&mut self, voltage: SecVoltage) -> io::Result<()>;
    fn send_diseqc(&mut self, message: &[u8]) -> io::Result<()>;
    fn send_burst(&mut self, burst: ToneBurst) -> io::Result<()>;
}

/// Handle of an open section filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterHandle(pub u32);

/// Data side of a tuner: kernel section filters.
pub trait SectionSource {
    /// Opens a filter for one table id on one PID and starts it.
    fn open(&mut self, pid: u16, table_id: u8) -> io::Result<FilterHandle>;
    fn close(&mut self, handle: FilterHandle);
    /// Waits up to `timeout` until any of `handles` is readable.
    fn wait(&mut self, handles: &[FilterHandle], timeout: Duration) -> io::Result<Vec<FilterHandle>>;
    /// Reads one section into `buf`.
    fn read(&mut self, handle: FilterHandle, buf: &mut [u8]) -> io::Result<usize>;
}

/// Picks the first probed frontend of type `wanted`, preferring one that
/// can do second generation delivery systems.
pub fn select_frontend(
    candidates: Vec<(PathBuf, FrontendInfo)>,
    wanted: FrontendType,
) -> Option<(PathBuf, FrontendInfo)> {
    let mut matching = candidates.into_iter().filter(|(_, info)| info.frontend_type == wanted);
    let first = matching.next()?;
    if first.1.caps.has(FrontendCaps::MODULATION_2G) {
        return Some(first);
    }
    Some(
        matching
            .find(|(_, info)| info.caps.has(FrontendCaps::MODULATION_2G))
            .unwrap_or(first),
    )
}
