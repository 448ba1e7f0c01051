use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read};
use std::os::fd::{AsFd, AsRawFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

use dvbscan_si::FrontendType;
use log::{debug, warn};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use super::dtv::{DtvCommand, DtvProperty};
use super::{
    FilterHandle, Frontend, FrontendCaps, FrontendInfo, FrontendStatus, SecVoltage, SectionSource,
    ToneBurst,
};

const MAX_ADAPTERS: u32 = 8;
const MAX_FRONTENDS: u32 = 4;

#[allow(dead_code)]
mod sys {
    use nix::{ioctl_read, ioctl_write_int_bad, ioctl_write_ptr, request_code_none};

    #[repr(C)]
    pub struct DvbFrontendInfo {
        pub name: [u8; 128],
        pub fe_type: u32,
        pub frequency_min: u32,
        pub frequency_max: u32,
        pub frequency_stepsize: u32,
        pub frequency_tolerance: u32,
        pub symbol_rate_min: u32,
        pub symbol_rate_max: u32,
        pub symbol_rate_tolerance: u32,
        pub notifier_delay: u32,
        pub caps: u32,
    }

    #[repr(C)]
    pub struct DiseqcMasterCmd {
        pub msg: [u8; 6],
        pub msg_len: u8,
    }

    // union { data; dtv_fe_stats; buffer { data[32]; len; reserved1[3]; void *reserved2 } }
    const UNION_LEN: usize = 32 + 4 + 3 * 4 + std::mem::size_of::<usize>();

    #[repr(C, packed)]
    #[derive(Clone, Copy)]
    pub struct DtvPropertyRaw {
        pub cmd: u32,
        pub reserved: [u32; 3],
        pub data: u32,
        pub rest: [u8; UNION_LEN - 4],
        pub result: i32,
    }

    impl DtvPropertyRaw {
        pub fn new(cmd: u32, data: u32) -> Self {
            DtvPropertyRaw {
                cmd,
                reserved: [0; 3],
                data,
                rest: [0; UNION_LEN - 4],
                result: 0,
            }
        }
    }

    #[repr(C)]
    pub struct DtvProperties {
        pub num: u32,
        pub props: *mut DtvPropertyRaw,
    }

    #[repr(C)]
    pub struct DmxFilter {
        pub filter: [u8; 16],
        pub mask: [u8; 16],
        pub mode: [u8; 16],
    }

    #[repr(C)]
    pub struct DmxSctFilterParams {
        pub pid: u16,
        pub filter: DmxFilter,
        pub timeout: u32,
        pub flags: u32,
    }

    pub const DMX_CHECK_CRC: u32 = 1;
    pub const DMX_IMMEDIATE_START: u32 = 4;

    ioctl_read!(fe_get_info, b'o', 61, DvbFrontendInfo);
    ioctl_write_ptr!(fe_diseqc_send_master_cmd, b'o', 63, DiseqcMasterCmd);
    ioctl_write_int_bad!(fe_diseqc_send_burst, request_code_none!(b'o', 65));
    ioctl_write_int_bad!(fe_set_tone, request_code_none!(b'o', 66));
    ioctl_write_int_bad!(fe_set_voltage, request_code_none!(b'o', 67));
    ioctl_read!(fe_read_status, b'o', 69, u32);
    ioctl_read!(fe_read_signal_strength, b'o', 71, u16);
    ioctl_read!(fe_read_snr, b'o', 72, u16);
    ioctl_write_ptr!(fe_set_property, b'o', 82, DtvProperties);
    ioctl_read!(fe_get_property, b'o', 83, DtvProperties);
    ioctl_write_ptr!(dmx_set_filter, b'o', 43, DmxSctFilterParams);
}

/// A `/dev/dvb/adapterN/frontendM` device.
pub struct LinuxFrontend {
    file: File,
    info: FrontendInfo,
}

impl LinuxFrontend {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut info = query_info(&file)?;
        info.api_version = query_api_version(&file).unwrap_or_else(|e| {
            warn!("DTV_API_VERSION query failed ({}), assuming DVB API 3.0", e);
            0x0300
        });
        debug!(
            "{}: {} ({}), DVB API {}",
            path.display(),
            info.name,
            info.frontend_type,
            info.api_version_string()
        );
        Ok(LinuxFrontend { file, info })
    }

    fn fd(&self) -> i32 {
        self.file.as_raw_fd()
    }
}

fn query_info(file: &File) -> io::Result<FrontendInfo> {
    // SAFETY: plain old data, filled in by the kernel.
    let mut raw: sys::DvbFrontendInfo = unsafe { std::mem::zeroed() };
    unsafe { sys::fe_get_info(file.as_raw_fd(), &mut raw) }?;

    let frontend_type = match raw.fe_type {
        0 => FrontendType::Satellite,
        1 => FrontendType::Cable,
        2 => FrontendType::Terrestrial,
        3 => FrontendType::Atsc,
        other => {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("unknown frontend type {}", other),
            ))
        }
    };
    let end = raw.name.iter().position(|&c| c == 0).unwrap_or(raw.name.len());

    Ok(FrontendInfo {
        name: String::from_utf8_lossy(&raw.name[..end]).into_owned(),
        frontend_type,
        frequency_min: raw.frequency_min,
        frequency_max: raw.frequency_max,
        frequency_stepsize: raw.frequency_stepsize,
        symbol_rate_min: raw.symbol_rate_min,
        symbol_rate_max: raw.symbol_rate_max,
        caps: FrontendCaps(raw.caps),
        api_version: 0,
    })
}

fn query_api_version(file: &File) -> io::Result<u16> {
    let mut props = [sys::DtvPropertyRaw::new(DtvCommand::ApiVersion as u32, 0)];
    let mut cmdseq = sys::DtvProperties {
        num: 1,
        props: props.as_mut_ptr(),
    };
    unsafe { sys::fe_get_property(file.as_raw_fd(), &mut cmdseq) }?;
    let data = props[0].data;
    Ok(data as u16)
}

impl Frontend for LinuxFrontend {
    fn info(&self) -> &FrontendInfo {
        &self.info
    }

    fn set_properties(&mut self, properties: &[DtvProperty]) -> io::Result<()> {
        let mut props: Vec<_> = properties
            .iter()
            .map(|p| sys::DtvPropertyRaw::new(p.cmd as u32, p.data))
            .collect();
        let cmdseq = sys::DtvProperties {
            num: props.len() as u32,
            props: props.as_mut_ptr(),
        };
        unsafe { sys::fe_set_property(self.fd(), &cmdseq) }?;
        Ok(())
    }

    fn read_status(&mut self) -> io::Result<FrontendStatus> {
        let mut status = 0u32;
        unsafe { sys::fe_read_status(self.fd(), &mut status) }?;
        Ok(FrontendStatus(status))
    }

    fn signal_strength(&mut self) -> io::Result<u16> {
        let mut value = 0u16;
        unsafe { sys::fe_read_signal_strength(self.fd(), &mut value) }?;
        Ok(value)
    }

    fn snr(&mut self) -> io::Result<u16> {
        let mut value = 0u16;
        unsafe { sys::fe_read_snr(self.fd(), &mut value) }?;
        Ok(value)
    }

    fn set_tone(&mut self, on: bool) -> io::Result<()> {
        unsafe { sys::fe_set_tone(self.fd(), if on { 0 } else { 1 }) }?;
        Ok(())
    }

    fn set_voltage(&mut self, voltage: SecVoltage) -> io::Result<()> {
        let value = match voltage {
            SecVoltage::V13 => 0,
            SecVoltage::V18 => 1,
            SecVoltage::Off => 2,
        };
        unsafe { sys::fe_set_voltage(self.fd(), value) }?;
        Ok(())
    }

    fn send_diseqc(&mut self, message: &[u8]) -> io::Result<()> {
        if message.len() < 3 || message.len() > 6 {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "DiSEqC messages are 3 to 6 bytes",
            ));
        }
        let mut cmd = sys::DiseqcMasterCmd {
            msg: [0; 6],
            msg_len: message.len() as u8,
        };
        cmd.msg[..message.len()].copy_from_slice(message);
        unsafe { sys::fe_diseqc_send_master_cmd(self.fd(), &cmd) }?;
        Ok(())
    }

    fn send_burst(&mut self, burst: ToneBurst) -> io::Result<()> {
        let value = match burst {
            ToneBurst::A => 0,
            ToneBurst::B => 1,
        };
        unsafe { sys::fe_diseqc_send_burst(self.fd(), value) }?;
        Ok(())
    }
}

/// Section filters on a `/dev/dvb/adapterN/demuxM` device, one open file each.
pub struct LinuxDemux {
    path: PathBuf,
    filters: HashMap<FilterHandle, File>,
    next_handle: u32,
}

impl LinuxDemux {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LinuxDemux {
            path: path.into(),
            filters: HashMap::new(),
            next_handle: 0,
        }
    }

    /// The demux next to a frontend node, `frontendM` becoming `demuxM`.
    pub fn path_for(frontend: &Path) -> PathBuf {
        let name = frontend
            .file_name()
            .map(|n| n.to_string_lossy().replace("frontend", "demux"))
            .unwrap_or_else(|| "demux0".to_string());
        frontend.with_file_name(name)
    }

    fn file(&mut self, handle: FilterHandle) -> io::Result<&mut File> {
        self.filters
            .get_mut(&handle)
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "filter is not open"))
    }
}

impl SectionSource for LinuxDemux {
    fn open(&mut self, pid: u16, table_id: u8) -> io::Result<FilterHandle> {
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;

        let mut params = sys::DmxSctFilterParams {
            pid,
            filter: sys::DmxFilter {
                filter: [0; 16],
                mask: [0; 16],
                mode: [0; 16],
            },
            timeout: 0,
            flags: sys::DMX_CHECK_CRC | sys::DMX_IMMEDIATE_START,
        };
        params.filter.filter[0] = table_id;
        params.filter.mask[0] = 0xFF;
        unsafe { sys::dmx_set_filter(file.as_raw_fd(), &params) }?;

        let handle = FilterHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        self.filters.insert(handle, file);
        Ok(handle)
    }

    fn close(&mut self, handle: FilterHandle) {
        self.filters.remove(&handle);
    }

    fn wait(&mut self, handles: &[FilterHandle], timeout: Duration) -> io::Result<Vec<FilterHandle>> {
        let open: Vec<(FilterHandle, &File)> = handles
            .iter()
            .filter_map(|h| self.filters.get(h).map(|f| (*h, f)))
            .collect();
        let mut fds: Vec<PollFd> = open
            .iter()
            .map(|(_, f)| PollFd::new(f.as_fd(), PollFlags::POLLIN | PollFlags::POLLPRI))
            .collect();

        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        Ok(open
            .iter()
            .zip(fds.iter())
            .filter(|(_, fd)| fd.revents().map_or(false, |r| !r.is_empty()))
            .map(|((handle, _), _)| *handle)
            .collect())
    }

    fn read(&mut self, handle: FilterHandle, buf: &mut [u8]) -> io::Result<usize> {
        let file = self.file(handle)?;
        match file.read(buf) {
            // the kernel buffer overflowed, the next read starts clean
            Err(e) if e.raw_os_error() == Some(Errno::EOVERFLOW as i32) => file.read(buf),
            other => other,
        }
    }
}

/// Lists every frontend node that answers `FE_GET_INFO`.
pub fn probe_frontends() -> Vec<(PathBuf, FrontendInfo)> {
    let mut found = Vec::new();
    for adapter in 0..MAX_ADAPTERS {
        for frontend in 0..MAX_FRONTENDS {
            let path = PathBuf::from(format!("/dev/dvb/adapter{}/frontend{}", adapter, frontend));
            if !path.exists() {
                continue;
            }
            match LinuxFrontend::open(&path) {
                Ok(fe) => found.push((path, fe.info)),
                Err(e) => debug!("{}: {}", path.display(), e),
            }
        }
    }
    found
}
