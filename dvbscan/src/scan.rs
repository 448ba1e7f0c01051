//! Scan orchestration.
//!
//! A scan runs in two phases. The first finds at least one transponder,
//! either by sweeping a channel plan or by replaying initial tuning data,
//! and reads the NIT of every carrier that locks. The second takes
//! transponders off the `new` queue one at a time, tunes them and reads
//! their PAT, PMT, SDT and NIT (or VCT for ATSC). NIT sections keep
//! feeding the queue until it runs dry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dvbscan_si::{pid, table_id, FrontendParameters, FrontendType, Modulation};
use log::{debug, info, warn};

use crate::channels::SweepGroup;
use crate::delivery::DeliverySystem;
use crate::error::ScanError;
use crate::filter::{table_name, FilterMux, FilterSpec, MAX_RUNNING_FILTERS};
use crate::model::ScanStatus;
use crate::session::{ScanSession, TransponderId};
use crate::tuner::{Frontend, SectionSource};
use crate::tuning::{Programmed, TuneOutcome, Tuner};

/// Lock samples taken for a sweep candidate.
const SWEEP_LOCK_SAMPLES: usize = 10;
/// Lock samples taken for an initial tuning data entry.
const REPLAY_LOCK_SAMPLES: usize = 5;

/// Where the first transponders come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanPlan {
    /// Blind sweep; each group holds the alternatives of one sweep point.
    Sweep(Vec<SweepGroup>),
    /// Initial tuning data, tried in order.
    Replay(Vec<FrontendParameters>),
}

/// How a scan ended. Either way the session holds a valid result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    Completed,
    Interrupted,
}

pub struct Scanner<F, S> {
    session: ScanSession,
    tuner: Tuner<F>,
    mux: FilterMux<S>,
    interrupted: Arc<AtomicBool>,
}

impl<F: Frontend, S: SectionSource> Scanner<F, S> {
    pub fn new(session: ScanSession, tuner: Tuner<F>, demux: S, interrupted: Arc<AtomicBool>) -> Self {
        let poll = tuner.pacing().demux_poll;
        Scanner {
            session,
            tuner,
            mux: FilterMux::with_limits(demux, MAX_RUNNING_FILTERS, poll),
            interrupted,
        }
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn into_session(self) -> ScanSession {
        self.session
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Runs both phases.
    ///
    /// Fails with [`ScanError::NothingToScan`] when the first phase found
    /// nothing. An interrupt ends the scan early without an error.
    pub fn run(&mut self, plan: ScanPlan) -> Result<ScanEnd, ScanError> {
        match plan {
            ScanPlan::Sweep(groups) => self.sweep(groups)?,
            ScanPlan::Replay(transponders) => self.replay(transponders)?,
        }
        if self.is_interrupted() {
            return Ok(ScanEnd::Interrupted);
        }
        if self.session.next_new().is_none() {
            return Err(ScanError::NothingToScan);
        }

        while let Some(id) = self.tune_to_next()? {
            self.scan_tp(id)?;
            if self.is_interrupted() {
                break;
            }
        }
        if self.is_interrupted() {
            info!("Interrupted, {} transponders scanned", self.session.scanned().count());
            return Ok(ScanEnd::Interrupted);
        }
        Ok(ScanEnd::Completed)
    }

    /// Probes every sweep point and keeps the ones that lock.
    fn sweep(&mut self, groups: Vec<SweepGroup>) -> Result<(), ScanError> {
        let pacing = *self.tuner.pacing();
        for group in groups {
            for params in group {
                if self.is_interrupted() {
                    return Ok(());
                }
                if self.session.is_known_initial_transponder(&params) {
                    info!("{}: skipped (already known transponder)", params.frequency());
                    // the rest of the group are alternatives of the same carrier
                    break;
                }
                debug!("probing {}", params);
                if self.tuner.set_frontend(&params)? != Programmed::Tuned {
                    continue;
                }
                thread::sleep(pacing.sweep_settle);
                if !self.tuner.wait_for_lock(SWEEP_LOCK_SAMPLES, pacing.sweep_poll)? {
                    continue;
                }
                if self.tuner.tune(&params, false)? != TuneOutcome::Locked {
                    continue;
                }
                info!("signal ok:\n\t{}", params);
                let id = self.session.add_transponder(params);
                self.scan_network(id)?;
                break;
            }
        }
        Ok(())
    }

    /// Tunes each initial transponder once and reads its NIT.
    fn replay(&mut self, transponders: Vec<FrontendParameters>) -> Result<(), ScanError> {
        let pacing = *self.tuner.pacing();
        for params in transponders {
            if self.is_interrupted() {
                return Ok(());
            }
            if self.session.is_known_initial_transponder(&params) {
                info!("{}: skipped (already known transponder)", params.frequency());
                continue;
            }
            info!("initial transponder {}", params);
            match self.tuner.set_frontend(&params)? {
                Programmed::Tuned => {}
                Programmed::Skipped => continue,
                Programmed::Failed => {
                    info!("----------no signal----------");
                    continue;
                }
            }
            thread::sleep(pacing.replay_settle);
            if !self.tuner.wait_for_lock(REPLAY_LOCK_SAMPLES, pacing.replay_poll)?
                || self.tuner.tune(&params, false)? != TuneOutcome::Locked
            {
                info!("----------no signal----------");
                continue;
            }
            let id = self.session.add_transponder(params);
            self.scan_network(id)?;
        }
        Ok(())
    }

    /// Reads NIT actual and NIT other of a freshly found transponder.
    fn scan_network(&mut self, id: TransponderId) -> Result<(), ScanError> {
        if self.session.frontend == FrontendType::Atsc {
            return Ok(());
        }
        self.session.current = Some(id);
        self.add_filter(pid::NIT, table_id::NIT_ACTUAL, false);
        self.add_filter(pid::NIT, table_id::NIT_OTHER, true);
        self.drain()?;
        self.session.current = None;
        Ok(())
    }

    /// Takes the next transponder off the queue and tunes it.
    ///
    /// A transponder that does not lock is tried once more, then on each
    /// of its alternate frequencies. Returns `None` once the queue is empty.
    fn tune_to_next(&mut self) -> Result<Option<TransponderId>, ScanError> {
        while let Some(id) = self.session.next_new() {
            if self.is_interrupted() {
                return Ok(None);
            }
            self.session.mark_scanned(id);
            // only the announced frequency is retried, alternates get one attempt
            let mut first_attempt = true;
            loop {
                let params = self.session.get(id).params;
                let mut outcome = self.tuner.tune(&params, true)?;
                if outcome == TuneOutcome::NoSignal && first_attempt {
                    outcome = self.tuner.tune(&params, true)?;
                }
                first_attempt = false;
                let tp = self.session.get_mut(id);
                match outcome {
                    TuneOutcome::Locked => {
                        tp.last_tuning_failed = false;
                        return Ok(Some(id));
                    }
                    TuneOutcome::Skipped => {
                        tp.status = ScanStatus::Skipped;
                        break;
                    }
                    TuneOutcome::NoSignal => {
                        tp.last_tuning_failed = true;
                        if !self.next_alternate(id) {
                            self.session.get_mut(id).status = ScanStatus::TuningFailed;
                            break;
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    /// Moves a transponder to its next untried alternate frequency.
    ///
    /// Alternates that belong to another known transponder are passed over.
    fn next_alternate(&mut self, id: TransponderId) -> bool {
        loop {
            let tp = self.session.get_mut(id);
            if !tp.other_frequency {
                return false;
            }
            let Some(frequency) = tp.alternate_frequencies.pop() else {
                return false;
            };
            tp.params.set_frequency(frequency);
            let params = tp.params;
            if self.session.find_transponder_except(&params, Some(id)).is_none() {
                info!("retrying with f={}", frequency);
                return true;
            }
            debug!("alternate f={} is a known transponder", frequency);
        }
    }

    /// Collects the tables of the tuned transponder.
    fn scan_tp(&mut self, id: TransponderId) -> Result<(), ScanError> {
        self.session.current = Some(id);
        let params = self.session.get(id).params;

        if self.session.frontend == FrontendType::Atsc {
            if !self.session.options.no_psip {
                let vct = match params {
                    FrontendParameters::Atsc(p) if matches!(p.modulation, Modulation::Vsb8 | Modulation::Vsb16) => {
                        table_id::TVCT
                    }
                    _ => table_id::CVCT,
                };
                self.add_filter(pid::PSIP, vct, false);
            }
            self.add_filter(pid::PAT, table_id::PAT, false);
        } else {
            self.add_filter(pid::PAT, table_id::PAT, false);
            self.add_filter(pid::SDT, table_id::SDT_ACTUAL, false);
            self.add_filter(pid::NIT, table_id::NIT_ACTUAL, false);
            if self.session.options.get_other_nits {
                self.add_filter(pid::NIT, table_id::NIT_OTHER, true);
            }
        }

        self.drain()?;
        let tp = self.session.get_mut(id);
        tp.status = ScanStatus::Scanned;
        debug!("{}: {} services", tp.params, tp.services.len());
        self.session.current = None;
        Ok(())
    }

    fn add_filter(&mut self, pid: u16, table: u8, segmented: bool) {
        let timeout = filter_timeout(
            self.session.frontend,
            table,
            self.tuner.pacing().filter_unit,
            self.session.options.long_filter_timeout,
        );
        self.mux.add(FilterSpec {
            pid,
            table_id: table,
            run_once: true,
            segmented,
            timeout,
        });
    }

    /// Feeds sections to the handlers until every filter has finished.
    fn drain(&mut self) -> Result<(), ScanError> {
        while !self.mux.is_idle() {
            if self.is_interrupted() {
                self.mux.reset();
                return Ok(());
            }
            for section in self.mux.read_filters()? {
                match self.session.handle_section(section.table_id, &section.data) {
                    Ok(pmt_pids) => {
                        for pmt_pid in pmt_pids {
                            self.add_filter(pmt_pid, table_id::PMT, false);
                        }
                    }
                    Err(e) => warn!(
                        "Dropping {} section on pid 0x{:04x}: {}",
                        table_name(section.table_id),
                        section.pid,
                        e
                    ),
                }
            }
        }
        self.mux.reset();
        Ok(())
    }
}

/// Time a filter waits for its table: the repetition rate in `unit`s,
/// doubled in long mode.
pub fn filter_timeout(frontend: FrontendType, table: u8, unit: Duration, long: bool) -> Duration {
    unit * frontend.repetition_rate(table) * if long { 2 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{ChannelList, SweepPass};
    use crate::output::{dump_lists, DumpFilter, VdrWriter, ZapWriter};
    use crate::session::ScanOptions;
    use crate::testing::fixtures::{dvbt, nit, pat, pmt, sdt};
    use crate::testing::{fast_pacing, MockDemux, MockFrontend, World};
    use crate::tuning::SatelliteSetup;
    use dvbscan_si::encode::{frequency_list_descriptor, terrestrial_delivery_descriptor};
    use dvbscan_si::{Bandwidth, Inversion, NitTable, NitTransportStream};

    const CH1: u32 = 474_000_000;
    const CH2: u32 = 482_000_000;

    fn scanner(world: &World, interrupted: Arc<AtomicBool>) -> Scanner<MockFrontend, MockDemux> {
        let session = ScanSession::new(FrontendType::Terrestrial, ScanOptions::default());
        let tuner = Tuner::new(
            MockFrontend::new(world.clone(), FrontendType::Terrestrial),
            SatelliteSetup::default(),
            1,
            fast_pacing(),
        );
        Scanner::new(session, tuner, MockDemux::new(world.clone()), interrupted)
    }

    fn sweep(frequencies: &[u32]) -> ScanPlan {
        let pass = SweepPass {
            modulation: Modulation::QamAuto,
            channels: ChannelList::from_frequencies(frequencies, Bandwidth::Mhz8),
            symbol_rates: Vec::new(),
        };
        ScanPlan::Sweep(pass.groups(FrontendType::Terrestrial, Inversion::Auto))
    }

    /// Two services on channel 1, announced by a NIT listing `streams`.
    fn broadcast(world: &World, streams: &[(u16, dvbscan_si::TerrestrialParams)]) {
        world.lock(CH1);
        world.transmit(CH1, pid::PAT, pat(1, &[(0, 0x10), (101, 500), (102, 600)]));
        world.transmit(CH1, 500, pmt(101, 0x100, 0x110));
        world.transmit(CH1, 600, pmt(102, 0x101, 0x111));
        world.transmit(CH1, pid::SDT, sdt(1, &[(101, "Chan1"), (102, "Chan2")]));
        world.transmit(CH1, pid::NIT, nit(table_id::NIT_ACTUAL, 0x3001, "Net", streams));
    }

    #[test]
    fn test_sweep_finds_services() {
        let world = World::new();
        broadcast(&world, &[(1, dvbt(CH1))]);

        let mut scanner = scanner(&world, Arc::new(AtomicBool::new(false)));
        assert_eq!(scanner.run(sweep(&[CH1, CH2])).unwrap(), ScanEnd::Completed);
        assert_eq!(world.tune_log(), vec![CH1, CH1, CH2, CH1]);
        assert_eq!(world.open_filters(), 0);

        let session = scanner.into_session();
        let scanned: Vec<_> = session.scanned().collect();
        assert_eq!(scanned.len(), 1);
        let tp = scanned[0];
        assert_eq!(tp.status, ScanStatus::Scanned);
        assert_eq!(tp.transport_stream_id, 1);
        assert_eq!(tp.network_name.as_deref(), Some("Net"));
        assert!(tp.updated_by_nit);

        let ids: Vec<u16> = tp.services.iter().map(|s| s.service_id).collect();
        assert_eq!(ids, vec![101, 102]);
        let chan1 = tp.find_service(101).unwrap();
        assert_eq!(chan1.name.as_deref(), Some("Chan1"));
        assert_eq!(chan1.video_pid, 0x100);
        assert_eq!(chan1.pmt_pid, 500);
        let chan2 = tp.find_service(102).unwrap();
        assert_eq!(chan2.name.as_deref(), Some("Chan2"));
        assert_eq!(chan2.video_pid, 0x101);
        assert_eq!(chan2.pmt_pid, 600);
        assert_eq!(chan2.audio[0].pid, 0x111);
    }

    #[test]
    fn test_known_sweep_point_not_tuned() {
        let world = World::new();
        broadcast(&world, &[(1, dvbt(CH1)), (2, dvbt(CH2))]);

        let mut scanner = scanner(&world, Arc::new(AtomicBool::new(false)));
        assert_eq!(scanner.run(sweep(&[CH1, CH2])).unwrap(), ScanEnd::Completed);
        // CH2 comes from the NIT; the sweep never programs it
        assert_eq!(world.tune_log(), vec![CH1, CH1, CH1, CH2, CH2]);

        let session = scanner.into_session();
        let statuses: Vec<_> = session.scanned().map(|tp| (tp.frequency(), tp.status)).collect();
        assert_eq!(
            statuses,
            vec![(CH1, ScanStatus::Scanned), (CH2, ScanStatus::TuningFailed)]
        );
    }

    /// Sweeps CH1 and CH2, interrupted while the main loop tunes CH2.
    fn interrupted_session() -> (World, ScanSession) {
        let world = World::new();
        broadcast(&world, &[(1, dvbt(CH1))]);
        world.lock(CH2);
        world.transmit(CH2, pid::PAT, pat(2, &[(201, 700)]));

        let flag = Arc::new(AtomicBool::new(false));
        // third programming of CH2 is the main loop tune
        world.interrupt_on(CH2, 3, flag.clone());

        let mut scanner = scanner(&world, flag);
        assert_eq!(scanner.run(sweep(&[CH1, CH2])).unwrap(), ScanEnd::Interrupted);
        (world, scanner.into_session())
    }

    #[test]
    fn test_interrupt_keeps_scanned_transponder() {
        let (world, session) = interrupted_session();
        assert_eq!(world.open_filters(), 0);

        let first = session.scanned().next().unwrap();
        assert_eq!(first.frequency(), CH1);
        assert_eq!(first.services.len(), 2);
        assert_eq!(first.find_service(102).unwrap().name.as_deref(), Some("Chan2"));
        assert!(session.scanned().skip(1).all(|tp| tp.services.is_empty()));
    }

    #[test]
    fn test_interrupted_scan_dumps_complete_lines() {
        let (_world, session) = interrupted_session();

        let mut out = Vec::new();
        let count = dump_lists(&session, &VdrWriter::default(), &DumpFilter::default(), &mut out).unwrap();
        assert_eq!(count, 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2, "{}", text);
        for (line, name, sid) in [(lines[0], "Chan1", 101), (lines[1], "Chan2", 102)] {
            assert!(line.starts_with(&format!("{};Provider:474000:", name)), "{}", line);
            assert!(line.contains(":T:27500:"), "{}", line);
            assert!(line.contains(&format!(":0:0:{}:", sid)), "{}", line);
            assert_eq!(line.split(':').count(), 13, "{}", line);
        }
        assert!(!text.contains("482000"));
        assert!(!text.contains("201"));

        let mut out = Vec::new();
        dump_lists(&session, &ZapWriter::default(), &DumpFilter::default(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().map(|l| l.split(':').next().unwrap_or_default()).collect::<Vec<_>>(),
            vec!["Chan1(Provider)", "Chan2(Provider)"]
        );
        assert!(text.lines().all(|l| l.contains(":474000000:")), "{}", text);
        assert!(text.lines().next().unwrap().ends_with(":256:272:101"), "{}", text);
        assert!(!text.contains("482000000"));
    }

    #[test]
    fn test_alternate_frequencies() {
        let world = World::new();
        let mut descriptors = terrestrial_delivery_descriptor(&dvbt(490_000_000), true);
        descriptors.extend(frequency_list_descriptor(&[498_000_000, 506_000_000]));
        let network = NitTable {
            table_id: table_id::NIT_ACTUAL,
            network_id: 0x3001,
            transport_streams: vec![NitTransportStream {
                transport_stream_id: 2,
                original_network_id: 0x2114,
                descriptors,
                delivery: None,
                other_frequency: true,
                frequency_list: Vec::new(),
            }],
            ..Default::default()
        };
        world.lock(CH1);
        world.transmit(CH1, pid::PAT, pat(1, &[]));
        world.transmit(CH1, pid::NIT, network.encode().to_vec());
        world.lock(498_000_000);
        world.transmit(498_000_000, pid::PAT, pat(2, &[(301, 800)]));

        let mut scanner = scanner(&world, Arc::new(AtomicBool::new(false)));
        assert_eq!(scanner.run(sweep(&[CH1])).unwrap(), ScanEnd::Completed);
        assert_eq!(
            world.tune_log(),
            vec![CH1, CH1, CH1, 490_000_000, 490_000_000, 506_000_000, 498_000_000]
        );

        let session = scanner.into_session();
        let moved = session.scanned().nth(1).unwrap();
        assert_eq!(moved.frequency(), 498_000_000);
        assert_eq!(moved.status, ScanStatus::Scanned);
        assert_eq!(moved.services.len(), 1);
    }

    #[test]
    fn test_nothing_to_scan() {
        let world = World::new();
        let mut scanner = scanner(&world, Arc::new(AtomicBool::new(false)));
        assert!(matches!(
            scanner.run(sweep(&[CH1, CH2])),
            Err(ScanError::NothingToScan)
        ));
    }

    #[test]
    fn test_replay_reads_network() {
        let world = World::new();
        broadcast(&world, &[(1, dvbt(CH1)), (2, dvbt(CH2))]);
        world.lock(CH2);

        let mut scanner = scanner(&world, Arc::new(AtomicBool::new(false)));
        let plan = ScanPlan::Replay(vec![FrontendParameters::Terrestrial(dvbt(CH1))]);
        assert_eq!(scanner.run(plan).unwrap(), ScanEnd::Completed);
        let session = scanner.into_session();
        assert_eq!(session.scanned().filter(|tp| tp.status == ScanStatus::Scanned).count(), 2);
    }

    #[test]
    fn test_filter_timeout_scaling() {
        let unit = Duration::from_millis(10);
        assert_eq!(
            filter_timeout(FrontendType::Terrestrial, table_id::NIT_OTHER, unit, false),
            Duration::from_millis(120)
        );
        assert_eq!(
            filter_timeout(FrontendType::Cable, table_id::SDT_ACTUAL, unit, true),
            Duration::from_millis(40)
        );
    }
}
