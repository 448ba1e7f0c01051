use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::dtv::DtvProperty;
use super::{
    FilterHandle, Frontend, FrontendInfo, FrontendStatus, SecVoltage, SectionSource, ToneBurst,
};

const UNSUPPORTED_MSG: &str = "DVB device access is not supported on this platform (supported: Linux)";

fn unsupported<T>() -> io::Result<T> {
    Err(io::Error::new(ErrorKind::Unsupported, UNSUPPORTED_MSG))
}

pub struct LinuxFrontend {
    info: FrontendInfo,
}

impl LinuxFrontend {
    pub fn open(_path: &Path) -> io::Result<Self> {
        unsupported()
    }
}

impl Frontend for LinuxFrontend {
    fn info(&self) -> &FrontendInfo {
        &self.info
    }

    fn set_properties(&mut self, _properties: &[DtvProperty]) -> io::Result<()> {
        unsupported()
    }

    fn read_status(&mut self) -> io::Result<FrontendStatus> {
        unsupported()
    }

    fn signal_strength(&mut self) -> io::Result<u16> {
        unsupported()
    }

    fn snr(&mut self) -> io::Result<u16> {
        unsupported()
    }

    fn set_tone(&mut self, _on: bool) -> io::Result<()> {
        unsupported()
    }

    fn set_voltage(&mut self, _voltage: SecVoltage) -> io::Result<()> {
        unsupported()
    }

    fn send_diseqc(&mut self, _message: &[u8]) -> io::Result<()> {
        unsupported()
    }

    fn send_burst(&mut self, _burst: ToneBurst) -> io::Result<()> {
        unsupported()
    }
}

pub struct LinuxDemux;

impl LinuxDemux {
    pub fn new(_path: impl Into<PathBuf>) -> Self {
        LinuxDemux
    }

    pub fn path_for(frontend: &Path) -> PathBuf {
        frontend.with_file_name("demux0")
    }
}

impl SectionSource for LinuxDemux {
    fn open(&mut self, _pid: u16, _table_id: u8) -> io::Result<FilterHandle> {
        unsupported()
    }

    fn close(&mut self, _handle: FilterHandle) {}

    fn wait(&mut self, _handles: &[FilterHandle], _timeout: Duration) -> io::Result<Vec<FilterHandle>> {
        unsupported()
    }

    fn read(&mut self, _handle: FilterHandle, _buf: &mut [u8]) -> io::Result<usize> {
        unsupported()
    }
}

pub fn probe_frontends() -> Vec<(PathBuf, FrontendInfo)> {
    Vec::new()
}
