//! DVB API v5 property commands and the kernel encoding of tuning values.

use dvbscan_si::{
    CodeRate, GuardInterval, Hierarchy, Inversion, Modulation, Pilot, Rolloff, TransmissionMode,
};

/// `DTV_*` property commands used by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DtvCommand {
    Tune = 1,
    Clear = 2,
    Frequency = 3,
    Modulation = 4,
    BandwidthHz = 5,
    Inversion = 6,
    SymbolRate = 8,
    InnerFec = 9,
    Pilot = 12,
    Rolloff = 13,
    DeliverySystem = 17,
    ApiVersion = 35,
    CodeRateHp = 36,
    CodeRateLp = 37,
    GuardInterval = 38,
    TransmissionMode = 39,
    Hierarchy = 40,
}

/// One `struct dtv_property` of a `FE_SET_PROPERTY` sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtvProperty {
    pub cmd: DtvCommand,
    pub data: u32,
}

impl DtvProperty {
    pub const fn new(cmd: DtvCommand, data: u32) -> Self {
        DtvProperty { cmd, data }
    }
}

/// `fe_delivery_system` values.
pub mod delivery_system {
    pub const DVBC_ANNEX_A: u32 = 1;
    pub const DVBC_ANNEX_B: u32 = 2;
    pub const DVBT: u32 = 3;
    pub const DVBS: u32 = 5;
    pub const DVBS2: u32 = 6;
    pub const ATSC: u32 = 11;
}

/// Maps a tuning value onto its `linux/dvb/frontend.h` enum value.
pub trait KernelValue {
    fn kernel_value(self) -> u32;
}

impl KernelValue for Inversion {
    fn kernel_value(self) -> u32 {
        match self {
            Inversion::Off => 0,
            Inversion::On => 1,
            Inversion::Auto => 2,
        }
    }
}

impl KernelValue for CodeRate {
    fn kernel_value(self) -> u32 {
        match self {
            CodeRate::None => 0,
            CodeRate::Fec1_2 => 1,
            CodeRate::Fec2_3 => 2,
            CodeRate::Fec3_4 => 3,
            CodeRate::Fec4_5 => 4,
            CodeRate::Fec5_6 => 5,
            CodeRate::Fec6_7 => 6,
            CodeRate::Fec7_8 => 7,
            CodeRate::Fec8_9 => 8,
            CodeRate::Auto => 9,
            CodeRate::Fec3_5 => 10,
            CodeRate::Fec9_10 => 11,
        }
    }
}

impl KernelValue for Modulation {
    fn kernel_value(self) -> u32 {
        match self {
            Modulation::Qpsk => 0,
            Modulation::Qam16 => 1,
            Modulation::Qam32 => 2,
            Modulation::Qam64 => 3,
            Modulation::Qam128 => 4,
            Modulation::Qam256 => 5,
            Modulation::QamAuto => 6,
            Modulation::Vsb8 => 7,
            Modulation::Vsb16 => 8,
            Modulation::Psk8 => 9,
            Modulation::Apsk16 => 10,
            Modulation::Apsk32 => 11,
        }
    }
}

impl KernelValue for TransmissionMode {
    fn kernel_value(self) -> u32 {
        match self {
            TransmissionMode::Mode2k => 0,
            TransmissionMode::Mode8k => 1,
            TransmissionMode::Auto => 2,
            TransmissionMode::Mode4k => 3,
        }
    }
}

impl KernelValue for GuardInterval {
    fn kernel_value(self) -> u32 {
        match self {
            GuardInterval::Guard1_32 => 0,
            GuardInterval::Guard1_16 => 1,
            GuardInterval::Guard1_8 => 2,
            GuardInterval::Guard1_4 => 3,
            GuardInterval::Auto => 4,
        }
    }
}

impl KernelValue for Hierarchy {
    fn kernel_value(self) -> u32 {
        match self {
            Hierarchy::None => 0,
            Hierarchy::Alpha1 => 1,
            Hierarchy::Alpha2 => 2,
            Hierarchy::Alpha4 => 3,
            Hierarchy::Auto => 4,
        }
    }
}

impl KernelValue for Pilot {
    fn kernel_value(self) -> u32 {
        match self {
            Pilot::On => 0,
            Pilot::Off => 1,
            Pilot::Auto => 2,
        }
    }
}

impl KernelValue for Rolloff {
    fn kernel_value(self) -> u32 {
        match self {
            Rolloff::Rolloff35 => 0,
            Rolloff::Rolloff20 => 1,
            Rolloff::Rolloff25 => 2,
            Rolloff::Auto => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_values() {
        assert_eq!(CodeRate::Auto.kernel_value(), 9);
        assert_eq!(CodeRate::Fec9_10.kernel_value(), 11);
        assert_eq!(Modulation::Vsb8.kernel_value(), 7);
        assert_eq!(TransmissionMode::Mode4k.kernel_value(), 3);
        assert_eq!(Rolloff::Rolloff20.kernel_value(), 1);
        assert_eq!(DtvCommand::Hierarchy as u32, 40);
    }
}
