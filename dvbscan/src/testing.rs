//! In-memory frontend and demux for tests.
//!
//! A [`World`] holds the sections each carrier frequency transmits and the
//! frequencies that lock. [`MockFrontend`] and [`MockDemux`] share it, so
//! whatever the frontend was last tuned to is what the demux delivers.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dvbscan_si::FrontendType;

use crate::tuner::{
    DtvCommand, DtvProperty, FilterHandle, Frontend, FrontendCaps, FrontendInfo, FrontendStatus,
    SecVoltage, SectionSource, ToneBurst,
};
use crate::tuning::Pacing;

#[derive(Default)]
struct WorldState {
    tuned: Option<u32>,
    carriers: HashMap<u32, Vec<(u16, Vec<u8>)>>,
    locking: HashSet<u32>,
    tune_log: Vec<u32>,
    interrupt: Option<(u32, usize, Arc<AtomicBool>)>,
    filters: HashMap<FilterHandle, VecDeque<Vec<u8>>>,
    next_handle: u32,
    diseqc: Vec<Vec<u8>>,
}

#[derive(Clone, Default)]
pub struct World(Rc<RefCell<WorldState>>);

impl World {
    pub fn new() -> Self {
        World::default()
    }

    /// Points the demux at a carrier without going through a frontend.
    pub fn tune(&self, frequency: u32) {
        self.0.borrow_mut().tuned = Some(frequency);
    }

    /// Adds a section to the carousel of a carrier.
    pub fn transmit(&self, frequency: u32, pid: u16, section: impl Into<Vec<u8>>) {
        self.0
            .borrow_mut()
            .carriers
            .entry(frequency)
            .or_default()
            .push((pid, section.into()));
    }

    /// Makes a carrier lock when tuned.
    pub fn lock(&self, frequency: u32) {
        self.0.borrow_mut().locking.insert(frequency);
    }

    /// Raises `flag` when `frequency` is programmed for the `nth` time (1-based).
    pub fn interrupt_on(&self, frequency: u32, nth: usize, flag: Arc<AtomicBool>) {
        self.0.borrow_mut().interrupt = Some((frequency, nth, flag));
    }

    /// Every frequency programmed so far, in order.
    pub fn tune_log(&self) -> Vec<u32> {
        self.0.borrow().tune_log.clone()
    }

    pub fn open_filters(&self) -> usize {
        self.0.borrow().filters.len()
    }

    pub fn diseqc_log(&self) -> Vec<Vec<u8>> {
        self.0.borrow().diseqc.clone()
    }
}

pub struct MockFrontend {
    world: World,
    info: FrontendInfo,
}

impl MockFrontend {
    pub fn new(world: World, frontend_type: FrontendType) -> Self {
        MockFrontend {
            world,
            info: FrontendInfo {
                name: "Mock Frontend".into(),
                frontend_type,
                frequency_min: 0,
                frequency_max: 0,
                frequency_stepsize: 0,
                symbol_rate_min: 0,
                symbol_rate_max: 0,
                caps: FrontendCaps(
                    FrontendCaps::INVERSION_AUTO
                        | FrontendCaps::QAM_AUTO
                        | FrontendCaps::VSB_8
                        | FrontendCaps::MODULATION_2G,
                ),
                api_version: 0x0505,
            },
        }
    }
}

impl Frontend for MockFrontend {
    fn info(&self) -> &FrontendInfo {
        &self.info
    }

    fn set_properties(&mut self, properties: &[DtvProperty]) -> io::Result<()> {
        let Some(frequency) = properties
            .iter()
            .find(|p| p.cmd == DtvCommand::Frequency)
            .map(|p| p.data)
        else {
            return Ok(());
        };

        let mut state = self.world.0.borrow_mut();
        state.tuned = Some(frequency);
        state.tune_log.push(frequency);
        let count = state.tune_log.iter().filter(|&&f| f == frequency).count();
        if let Some((at, nth, flag)) = &state.interrupt {
            if *at == frequency && *nth == count {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn read_status(&mut self) -> io::Result<FrontendStatus> {
        let state = self.world.0.borrow();
        let locked = state.tuned.map_or(false, |f| state.locking.contains(&f));
        Ok(FrontendStatus(if locked { 0x1F } else { 0x00 }))
    }

    fn signal_strength(&mut self) -> io::Result<u16> {
        Ok(0xC000)
    }

    fn snr(&mut self) -> io::Result<u16> {
        Ok(0x0100)
    }

    fn set_tone(&mut self, _on: bool) -> io::Result<()> {
        Ok(())
    }

    fn set_voltage(&mut self, _voltage: SecVoltage) -> io::Result<()> {
        Ok(())
    }

    fn send_diseqc(&mut self, message: &[u8]) -> io::Result<()> {
        self.world.0.borrow_mut().diseqc.push(message.to_vec());
        Ok(())
    }

    fn send_burst(&mut self, _burst: ToneBurst) -> io::Result<()> {
        Ok(())
    }
}

pub struct MockDemux {
    world: World,
}

impl MockDemux {
    pub fn new(world: World) -> Self {
        MockDemux { world }
    }
}

impl SectionSource for MockDemux {
    fn open(&mut self, pid: u16, table_id: u8) -> io::Result<FilterHandle> {
        let mut state = self.world.0.borrow_mut();
        let queue: VecDeque<Vec<u8>> = state
            .tuned
            .and_then(|f| state.carriers.get(&f))
            .map(|sections| {
                sections
                    .iter()
                    .filter(|(p, s)| *p == pid && s.first() == Some(&table_id))
                    .map(|(_, s)| s.clone())
                    .collect()
            })
            .unwrap_or_default();
        let handle = FilterHandle(state.next_handle);
        state.next_handle += 1;
        state.filters.insert(handle, queue);
        Ok(handle)
    }

    fn close(&mut self, handle: FilterHandle) {
        self.world.0.borrow_mut().filters.remove(&handle);
    }

    fn wait(&mut self, handles: &[FilterHandle], timeout: Duration) -> io::Result<Vec<FilterHandle>> {
        let ready: Vec<FilterHandle> = {
            let state = self.world.0.borrow();
            handles
                .iter()
                .filter(|h| state.filters.get(h).map_or(false, |q| !q.is_empty()))
                .copied()
                .collect()
        };
        if ready.is_empty() {
            thread::sleep(timeout.min(Duration::from_millis(1)));
        }
        Ok(ready)
    }

    fn read(&mut self, handle: FilterHandle, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.world.0.borrow_mut();
        let section = state
            .filters
            .get_mut(&handle)
            .and_then(|q| q.pop_front())
            .ok_or_else(|| io::Error::from(io::ErrorKind::WouldBlock))?;
        buf[..section.len()].copy_from_slice(&section);
        Ok(section.len())
    }
}

/// Pacing that never sleeps longer than a few milliseconds.
pub fn fast_pacing() -> Pacing {
    Pacing {
        lock_poll: Duration::ZERO,
        sweep_settle: Duration::ZERO,
        sweep_poll: Duration::ZERO,
        replay_settle: Duration::ZERO,
        replay_poll: Duration::ZERO,
        switch_settle: Duration::ZERO,
        diseqc_gap: Duration::ZERO,
        rotor_per_degree: Duration::ZERO,
        filter_unit: Duration::from_millis(5),
        demux_poll: Duration::from_millis(1),
    }
}

/// Sections as a broadcaster would send them.
pub mod fixtures {
    use dvbscan_si::encode::{descriptor, service_descriptor, terrestrial_delivery_descriptor};
    use dvbscan_si::{
        descriptor_tag, stream_type, Bandwidth, CodeRate, GuardInterval, Hierarchy, Modulation,
        NitTable, NitTransportStream, PatEntry, PatTable, PmtStream, PmtTable, SdtService,
        SdtTable, StreamKind, TerrestrialParams, TransmissionMode,
    };

    /// DVB-T parameters with every field that a delivery descriptor carries set.
    pub fn dvbt(frequency: u32) -> TerrestrialParams {
        TerrestrialParams {
            frequency,
            bandwidth: Bandwidth::Mhz8,
            code_rate_hp: CodeRate::Fec2_3,
            code_rate_lp: CodeRate::None,
            constellation: Modulation::Qam64,
            transmission_mode: TransmissionMode::Mode8k,
            guard_interval: GuardInterval::Guard1_4,
            hierarchy: Hierarchy::None,
            ..Default::default()
        }
    }

    pub fn pat(tsid: u16, programs: &[(u16, u16)]) -> Vec<u8> {
        PatTable {
            transport_stream_id: tsid,
            version_number: 0,
            programs: programs
                .iter()
                .map(|&(program_number, pid)| PatEntry { program_number, pid })
                .collect(),
        }
        .encode()
        .to_vec()
    }

    /// PMT with one MPEG-2 video and one MPEG audio stream.
    pub fn pmt(program_number: u16, video_pid: u16, audio_pid: u16) -> Vec<u8> {
        let stream = |stream_type, elementary_pid, kind| PmtStream {
            stream_type,
            elementary_pid,
            descriptors: Vec::new(),
            kind,
            language: None,
        };
        PmtTable {
            program_number,
            pcr_pid: video_pid,
            streams: vec![
                stream(stream_type::MPEG2_VIDEO, video_pid, StreamKind::Video),
                stream(stream_type::MPEG2_AUDIO, audio_pid, StreamKind::Audio),
            ],
            ..Default::default()
        }
        .encode()
        .to_vec()
    }

    /// SDT actual naming digital television services.
    pub fn sdt(tsid: u16, services: &[(u16, &str)]) -> Vec<u8> {
        SdtTable {
            transport_stream_id: tsid,
            original_network_id: 0x2114,
            services: services
                .iter()
                .map(|&(service_id, name)| SdtService {
                    service_id,
                    running_status: 4,
                    descriptors: service_descriptor(0x01, "Provider", name),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
        .encode()
        .to_vec()
    }

    /// NIT with one terrestrial delivery descriptor per transport stream.
    pub fn nit(
        table_id: u8,
        network_id: u16,
        name: &str,
        streams: &[(u16, TerrestrialParams)],
    ) -> Vec<u8> {
        NitTable {
            table_id,
            network_id,
            version_number: 0,
            network_name: Some(name.into()),
            network_descriptors: descriptor(descriptor_tag::NETWORK_NAME, name.as_bytes()),
            transport_streams: streams
                .iter()
                .map(|(tsid, params)| NitTransportStream {
                    transport_stream_id: *tsid,
                    original_network_id: 0x2114,
                    descriptors: terrestrial_delivery_descriptor(params, false),
                    delivery: None,
                    other_frequency: false,
                    frequency_list: Vec::new(),
                })
                .collect(),
        }
        .encode()
        .to_vec()
    }
}
