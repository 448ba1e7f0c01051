//! dvbscan library - transponder and service discovery for DVB-T/C/S/S2 and ATSC
//!
//! The scanner finds carriers by sweeping a channel plan or replaying
//! initial tuning data, then follows the NIT from one transponder to the
//! next and collects the services of each from PAT, PMT and SDT (VCT on
//! ATSC). Hardware is reached through the [`tuner::Frontend`] and
//! [`tuner::SectionSource`] traits.

pub mod channels;
pub mod config;
pub mod delivery;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod matcher;
pub mod model;
pub mod output;
pub mod scan;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;
pub mod tuner;
pub mod tuning;
pub mod tuning_data;

// Re-export commonly used types
pub use channels::{AtscType, CableSweep, ChannelPlan};
pub use error::ScanError;
pub use model::{ScanStatus, Service, ServiceKind, Transponder};
pub use scan::{ScanEnd, ScanPlan, Scanner};
pub use session::{ScanOptions, ScanSession};
pub use tuning::{Pacing, SatelliteSetup, Tuner};
