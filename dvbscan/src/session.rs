//! Scan session state.
//!
//! Transponders live in a single arena and are referred to by index. The
//! `new` queue holds transponders still to be tuned, `scanned` keeps the
//! order in which they were taken off the queue. A transponder is on
//! exactly one of the two lists.

use std::collections::VecDeque;

use dvbscan_si::{FrontendParameters, FrontendType, Inversion};

use crate::model::Transponder;

/// Index of a transponder in the session arena.
pub type TransponderId = usize;

/// Behaviour switches of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Collect NIT other sections as well as NIT actual.
    pub get_other_nits: bool,
    /// Queue transponders announced in the NIT.
    pub add_frequencies: bool,
    /// Double every filter timeout.
    pub long_filter_timeout: bool,
    /// Spectral inversion used for sweep candidates.
    pub inversion: Inversion,
    /// ATSC: read the PAT only, ignore the VCT.
    pub no_psip: bool,
    /// Lock wait multiplier, 1 to 3.
    pub tuning_timeout: u32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            get_other_nits: true,
            add_frequencies: true,
            long_filter_timeout: false,
            inversion: Inversion::Auto,
            no_psip: false,
            tuning_timeout: 1,
        }
    }
}

#[derive(Debug)]
pub struct ScanSession {
    pub frontend: FrontendType,
    pub options: ScanOptions,
    transponders: Vec<Transponder>,
    new: VecDeque<TransponderId>,
    scanned: Vec<TransponderId>,
    /// Transponder the demux is currently delivering sections for.
    pub current: Option<TransponderId>,
}

impl ScanSession {
    pub fn new(frontend: FrontendType, options: ScanOptions) -> Self {
        ScanSession {
            frontend,
            options,
            transponders: Vec::new(),
            new: VecDeque::new(),
            scanned: Vec::new(),
            current: None,
        }
    }

    /// Adds a transponder to the tail of the `new` queue.
    pub fn add_transponder(&mut self, params: FrontendParameters) -> TransponderId {
        self.insert(Transponder::new(params))
    }

    pub fn insert(&mut self, transponder: Transponder) -> TransponderId {
        let id = self.transponders.len();
        self.transponders.push(transponder);
        self.new.push_back(id);
        id
    }

    pub fn get(&self, id: TransponderId) -> &Transponder {
        &self.transponders[id]
    }

    pub fn get_mut(&mut self, id: TransponderId) -> &mut Transponder {
        &mut self.transponders[id]
    }

    pub fn current_mut(&mut self) -> Option<&mut Transponder> {
        self.current.map(|id| &mut self.transponders[id])
    }

    /// Moves a transponder to the tail of the `scanned` list.
    pub fn mark_scanned(&mut self, id: TransponderId) {
        self.new.retain(|&queued| queued != id);
        self.scanned.retain(|&done| done != id);
        self.scanned.push(id);
    }

    /// Head of the `new` queue.
    pub fn next_new(&self) -> Option<TransponderId> {
        self.new.front().copied()
    }

    pub fn new_ids(&self) -> impl Iterator<Item = TransponderId> + '_ {
        self.new.iter().copied()
    }

    pub fn scanned_ids(&self) -> impl Iterator<Item = TransponderId> + '_ {
        self.scanned.iter().copied()
    }

    /// Scanned transponders in scan order.
    pub fn scanned(&self) -> impl Iterator<Item = &Transponder> + '_ {
        self.scanned.iter().map(|&id| &self.transponders[id])
    }

    pub fn len(&self) -> usize {
        self.transponders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transponders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ScanSession {
        ScanSession::new(FrontendType::Cable, ScanOptions::default())
    }

    fn cable(frequency: u32) -> FrontendParameters {
        let mut params = FrontendParameters::empty(FrontendType::Cable);
        params.set_frequency(frequency);
        params
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut s = session();
        let a = s.add_transponder(cable(346_000_000));
        let b = s.add_transponder(cable(354_000_000));
        assert_eq!(s.next_new(), Some(a));
        s.mark_scanned(a);
        assert_eq!(s.next_new(), Some(b));
        assert_eq!(s.scanned_ids().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_transponder_on_exactly_one_list() {
        let mut s = session();
        let a = s.add_transponder(cable(346_000_000));
        let b = s.add_transponder(cable(354_000_000));
        s.mark_scanned(a);
        s.mark_scanned(b);
        s.mark_scanned(a);
        assert_eq!(s.new_ids().count(), 0);
        assert_eq!(s.scanned_ids().collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(s.len(), 2);
    }
}
