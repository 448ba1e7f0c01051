//! Transponder identity.
//!
//! The same carrier is reached from several directions during a scan: the
//! sweep, NIT actual, NIT other of neighbouring networks. These lookups
//! decide whether a candidate is already known.

use dvbscan_si::{FrontendParameters, FrontendType};

use crate::delivery::DeliverySystem;
use crate::session::{ScanSession, TransponderId};

/// Frequencies equal within the delivery system tolerance.
pub fn is_nearly_same_frequency(a: u32, b: u32, frontend: FrontendType) -> bool {
    a == b || a.abs_diff(b) < frontend.frequency_tolerance()
}

/// Same delivery system, nearly same frequency, and no parameter that
/// differs unless one side left it on `Auto`.
pub fn is_same_transponder(a: &FrontendParameters, b: &FrontendParameters) -> bool {
    let frontend = a.frontend_type();
    frontend == b.frontend_type()
        && is_nearly_same_frequency(a.frequency(), b.frequency(), frontend)
        && !frontend.parameters_differ(a, b, true)
}

impl ScanSession {
    /// Looks a candidate up among scanned, then queued transponders.
    pub fn find_transponder(&self, params: &FrontendParameters) -> Option<TransponderId> {
        self.find_transponder_except(params, None)
    }

    /// Like [`find_transponder`](Self::find_transponder), never returning `except`.
    pub fn find_transponder_except(
        &self,
        params: &FrontendParameters,
        except: Option<TransponderId>,
    ) -> Option<TransponderId> {
        self.scanned_ids()
            .chain(self.new_ids())
            .filter(|&id| Some(id) != except)
            .find(|&id| is_same_transponder(&self.get(id).params, params))
    }

    /// Cheap duplicate check for sweep candidates, keyed on frequency.
    ///
    /// Satellite candidates also have to agree on polarization, ATSC
    /// candidates on modulation.
    pub fn is_known_initial_transponder(&self, params: &FrontendParameters) -> bool {
        let frontend = params.frontend_type();
        self.new_ids()
            .chain(self.scanned_ids())
            .map(|id| &self.get(id).params)
            .any(|known| {
                known.frontend_type() == frontend
                    && is_nearly_same_frequency(known.frequency(), params.frequency(), frontend)
                    && match (known, params) {
                        (FrontendParameters::Satellite(a), FrontendParameters::Satellite(b)) => {
                            a.polarization == b.polarization
                        }
                        (FrontendParameters::Atsc(a), FrontendParameters::Atsc(b)) => {
                            a.modulation == b.modulation
                        }
                        _ => true,
                    }
            })
    }
}
