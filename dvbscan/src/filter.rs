//! Section filter multiplexing.
//!
//! The demux runs a limited number of section filters at a time. Filters
//! beyond that limit wait in FIFO order and are started as running ones
//! finish. Each running filter remembers which section numbers it has
//! already delivered, so every section reaches the handlers once.
//!
//! ```text
//!  add() ──► Waiting ──start──► Running ──complete──► Done
//!              ▲  (FIFO)          │
//!              └── slot freed ◄───┴──timeout──► TimedOut
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, ErrorKind};
use std::time::{Duration, Instant};

use dvbscan_si::psi::SECTION_PREFIX_LEN;
use dvbscan_si::{table_id, PsiHeader, PsiSection};
use log::{debug, info, warn};

use crate::tuner::{FilterHandle, SectionSource};

/// Concurrently running section filters.
pub const MAX_RUNNING_FILTERS: usize = 27;
/// PSI and SI sections never exceed 1024 bytes.
const SECTION_BUF_LEN: usize = 1024;

/// What to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSpec {
    pub pid: u16,
    pub table_id: u8,
    /// Remove the filter once it completes or times out.
    pub run_once: bool,
    /// Track each table id extension on its own and keep collecting until
    /// the timeout. Used for NIT other, where several networks share a PID.
    pub segmented: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStatus {
    Waiting,
    Running,
    Done,
    TimedOut,
}

/// A section delivered by a filter, owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedSection {
    pub filter: FilterId,
    pub pid: u16,
    pub table_id: u8,
    pub data: Vec<u8>,
}

/// Seen-set of one table (one table id extension, one version).
#[derive(Debug, Clone)]
struct SectionProgress {
    version: u8,
    table_id_extension: u16,
    last_section_number: u8,
    seen: [u8; 32],
}

impl SectionProgress {
    fn new(header: &PsiHeader) -> Self {
        SectionProgress {
            version: header.version_number,
            table_id_extension: header.table_id_extension,
            last_section_number: header.last_section_number,
            seen: [0; 32],
        }
    }

    fn is_seen(&self, section_number: u8) -> bool {
        self.seen[section_number as usize / 8] & (1 << (section_number % 8)) != 0
    }

    /// Records a section, false when it was delivered before.
    fn accept(&mut self, header: &PsiHeader) -> bool {
        if header.version_number != self.version
            || header.table_id_extension != self.table_id_extension
        {
            *self = SectionProgress::new(header);
        }
        if self.is_seen(header.section_number) {
            return false;
        }
        self.seen[header.section_number as usize / 8] |= 1 << (header.section_number % 8);
        true
    }

    fn is_complete(&self) -> bool {
        (0..=self.last_section_number).all(|n| self.is_seen(n))
    }
}

#[derive(Debug)]
enum Tracker {
    Single(Option<SectionProgress>),
    Segmented(BTreeMap<u16, SectionProgress>),
}

impl Tracker {
    fn new(segmented: bool) -> Self {
        if segmented {
            Tracker::Segmented(BTreeMap::new())
        } else {
            Tracker::Single(None)
        }
    }

    fn accept(&mut self, header: &PsiHeader) -> bool {
        match self {
            Tracker::Single(progress) => progress
                .get_or_insert_with(|| SectionProgress::new(header))
                .accept(header),
            Tracker::Segmented(siblings) => siblings
                .entry(header.table_id_extension)
                .or_insert_with(|| SectionProgress::new(header))
                .accept(header),
        }
    }

    /// Segmented filters only end by timeout.
    fn is_done(&self) -> bool {
        match self {
            Tracker::Single(progress) => progress.as_ref().map_or(false, |p| p.is_complete()),
            Tracker::Segmented(_) => false,
        }
    }

    fn segments(&self) -> usize {
        match self {
            Tracker::Single(progress) => progress.is_some() as usize,
            Tracker::Segmented(siblings) => siblings.len(),
        }
    }
}

#[derive(Debug)]
enum FilterState {
    Waiting,
    Running {
        handle: FilterHandle,
        started: Instant,
        tracker: Tracker,
    },
    Done,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Start {
    Started,
    NoSlot,
    /// The device refused the filter; it is given up.
    Failed,
}

#[derive(Debug)]
struct Filter {
    spec: FilterSpec,
    state: FilterState,
}

/// Runs section filters on a [`SectionSource`].
pub struct FilterMux<S> {
    source: S,
    filters: Vec<Filter>,
    waiting: VecDeque<FilterId>,
    running: Vec<FilterId>,
    max_running: usize,
    poll_interval: Duration,
}

pub(crate) fn table_name(table: u8) -> &'static str {
    match table {
        table_id::PAT => "PAT",
        table_id::PMT => "PMT",
        table_id::NIT_ACTUAL => "NIT(actual)",
        table_id::NIT_OTHER => "NIT(other)",
        table_id::SDT_ACTUAL => "SDT(actual)",
        table_id::SDT_OTHER => "SDT(other)",
        table_id::TVCT => "TVCT",
        table_id::CVCT => "CVCT",
        _ => "table",
    }
}

impl<S: SectionSource> FilterMux<S> {
    pub fn new(source: S) -> Self {
        Self::with_limits(source, MAX_RUNNING_FILTERS, Duration::from_secs(1))
    }

    /// `poll_interval` bounds one wait for readable filters.
    pub fn with_limits(source: S, max_running: usize, poll_interval: Duration) -> Self {
        FilterMux {
            source,
            filters: Vec::new(),
            waiting: VecDeque::new(),
            running: Vec::new(),
            max_running,
            poll_interval,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Registers a filter and starts it if a slot is free.
    pub fn add(&mut self, spec: FilterSpec) -> FilterId {
        let id = FilterId(self.filters.len());
        self.filters.push(Filter {
            spec,
            state: FilterState::Waiting,
        });
        if !self.waiting.is_empty() || self.start(id) == Start::NoSlot {
            self.waiting.push_back(id);
        }
        id
    }

    fn start(&mut self, id: FilterId) -> Start {
        if self.running.len() >= self.max_running {
            return Start::NoSlot;
        }
        let spec = self.filters[id.0].spec;
        match self.source.open(spec.pid, spec.table_id) {
            Ok(handle) => {
                debug!(
                    "start filter pid 0x{:04x} table_id 0x{:02x}",
                    spec.pid, spec.table_id
                );
                self.filters[id.0].state = FilterState::Running {
                    handle,
                    started: Instant::now(),
                    tracker: Tracker::new(spec.segmented),
                };
                self.running.push(id);
                Start::Started
            }
            Err(e) => {
                warn!(
                    "Failed to start filter pid 0x{:04x} table_id 0x{:02x}: {}",
                    spec.pid, spec.table_id, e
                );
                self.filters[id.0].state = FilterState::TimedOut;
                Start::Failed
            }
        }
    }

    fn remove(&mut self, id: FilterId, state: FilterState) {
        if let FilterState::Running { handle, .. } = self.filters[id.0].state {
            self.source.close(handle);
        }
        self.filters[id.0].state = state;
        self.running.retain(|&r| r != id);

        while let Some(next) = self.waiting.pop_front() {
            if self.start(next) == Start::NoSlot {
                self.waiting.push_front(next);
                break;
            }
        }
    }

    /// Nothing running and nothing waiting.
    pub fn is_idle(&self) -> bool {
        self.running.is_empty() && self.waiting.is_empty()
    }

    pub fn status(&self, id: FilterId) -> FilterStatus {
        match self.filters[id.0].state {
            FilterState::Waiting => FilterStatus::Waiting,
            FilterState::Running { .. } => FilterStatus::Running,
            FilterState::Done => FilterStatus::Done,
            FilterState::TimedOut => FilterStatus::TimedOut,
        }
    }

    /// Distinct tables (table id extensions) seen by a running filter.
    pub fn segments(&self, id: FilterId) -> usize {
        match &self.filters[id.0].state {
            FilterState::Running { tracker, .. } => tracker.segments(),
            _ => 0,
        }
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Waits once for readable filters, reads one section from each and
    /// retires filters that completed or timed out.
    ///
    /// Returns sections not delivered before, in filter start order.
    pub fn read_filters(&mut self) -> io::Result<Vec<ReceivedSection>> {
        if self.running.is_empty() {
            return Ok(Vec::new());
        }
        let handles: Vec<FilterHandle> = self
            .running
            .iter()
            .filter_map(|id| match self.filters[id.0].state {
                FilterState::Running { handle, .. } => Some(handle),
                _ => None,
            })
            .collect();
        let ready = self.source.wait(&handles, self.poll_interval)?;

        let mut received = Vec::new();
        let mut finished = Vec::new();
        let mut buf = vec![0u8; SECTION_BUF_LEN];

        for &id in &self.running {
            let filter = &mut self.filters[id.0];
            let spec = filter.spec;
            let FilterState::Running {
                handle,
                started,
                tracker,
            } = &mut filter.state
            else {
                continue;
            };

            if ready.contains(handle) {
                match self.source.read(*handle, &mut buf) {
                    Ok(n) => {
                        if let Some(header) = valid_section(&buf[..n], spec.table_id) {
                            if tracker.accept(&header) {
                                received.push(ReceivedSection {
                                    filter: id,
                                    pid: spec.pid,
                                    table_id: header.table_id,
                                    data: buf[..n].to_vec(),
                                });
                            }
                        }
                    }
                    Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
                    Err(e) => warn!(
                        "Read error on pid 0x{:04x} table_id 0x{:02x}: {}",
                        spec.pid, spec.table_id, e
                    ),
                }
            }

            if !spec.run_once {
                continue;
            }
            if tracker.is_done() {
                finished.push((id, FilterState::Done));
            } else if started.elapsed() > spec.timeout {
                if spec.table_id == table_id::NIT_OTHER {
                    debug!("Filter timeout pid 0x{:04x} {}", spec.pid, table_name(spec.table_id));
                } else {
                    info!("Filter timeout pid 0x{:04x} {}", spec.pid, table_name(spec.table_id));
                }
                finished.push((id, FilterState::TimedOut));
            }
        }

        for (id, state) in finished {
            self.remove(id, state);
        }
        Ok(received)
    }

    /// Stops every filter, running or waiting.
    pub fn reset(&mut self) {
        for id in std::mem::take(&mut self.running) {
            if let FilterState::Running { handle, .. } = self.filters[id.0].state {
                self.source.close(handle);
            }
        }
        self.waiting.clear();
        self.filters.clear();
    }
}

/// One read must yield exactly one long section of the expected table.
fn valid_section(data: &[u8], expected_table: u8) -> Option<PsiHeader> {
    if data.len() < 4 {
        debug!("Dropping short section ({} bytes)", data.len());
        return None;
    }
    if PsiHeader::peek_section_length(data)? + SECTION_PREFIX_LEN != data.len() {
        debug!("Dropping section with inconsistent length");
        return None;
    }
    match PsiSection::parse(data) {
        Ok(section) if section.header.table_id == expected_table => Some(section.header),
        Ok(section) => {
            debug!("Dropping unexpected table 0x{:02x}", section.header.table_id);
            None
        }
        Err(e) => {
            debug!("Dropping malformed section: {}", e);
            None
        }
    }
}
