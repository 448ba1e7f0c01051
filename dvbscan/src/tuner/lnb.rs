//! LNB (low-noise block downconverter) types.
//!
//! A satellite frontend tunes the intermediate frequency the LNB produces,
//! not the downlink frequency. Local oscillator frequencies are kept in kHz.

use std::fmt;

use dvbscan_si::Polarization;

/// Local oscillator setup of an LNB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lnb {
    pub name: String,
    pub description: &'static str,
    pub low: u32,
    pub high: Option<u32>,
    /// High band starts at this downlink frequency.
    pub switch: Option<u32>,
}

struct LnbType {
    name: &'static str,
    description: &'static str,
    low_mhz: u32,
    high_mhz: u32,
    switch_mhz: u32,
}

const LNB_TYPES: [LnbType; 6] = [
    LnbType {
        name: "UNIVERSAL",
        description: "Europe, 10800 to 11800 MHz and 11600 to 12700 MHz, dual LO, loband 9750, hiband 10600 MHz",
        low_mhz: 9750,
        high_mhz: 10600,
        switch_mhz: 11700,
    },
    LnbType {
        name: "DBS",
        description: "Expressvu, North America, 12200 to 12700 MHz, single LO, 11250 MHz",
        low_mhz: 11250,
        high_mhz: 0,
        switch_mhz: 0,
    },
    LnbType {
        name: "STANDARD",
        description: "10945 to 11450 MHz, single LO, 10000 MHz",
        low_mhz: 10000,
        high_mhz: 0,
        switch_mhz: 0,
    },
    LnbType {
        name: "ENHANCED",
        description: "Astra, 10700 to 11700 MHz, single LO, 9750 MHz",
        low_mhz: 9750,
        high_mhz: 0,
        switch_mhz: 0,
    },
    LnbType {
        name: "C-BAND",
        description: "Big Dish, 3700 to 4200 MHz, single LO, 5150 MHz",
        low_mhz: 5150,
        high_mhz: 0,
        switch_mhz: 0,
    },
    LnbType {
        name: "C-MULTI",
        description: "Big Dish - Multipoint LNBf, 3700 to 4200 MHz, dual LO, V: 5150 MHz, H: 5750 MHz",
        low_mhz: 5150,
        high_mhz: 5750,
        switch_mhz: 0,
    },
];

impl LnbType {
    fn to_lnb(&self) -> Lnb {
        Lnb {
            name: self.name.to_string(),
            description: self.description,
            low: self.low_mhz * 1000,
            high: (self.high_mhz != 0).then_some(self.high_mhz * 1000),
            switch: (self.switch_mhz != 0).then_some(self.switch_mhz * 1000),
        }
    }
}

/// Result of mapping a downlink frequency through the LNB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntermediateFrequency {
    /// kHz.
    pub frequency: u32,
    pub hiband: bool,
}

impl Lnb {
    /// Every built-in LNB type.
    pub fn known() -> Vec<Lnb> {
        LNB_TYPES.iter().map(LnbType::to_lnb).collect()
    }

    pub fn universal() -> Lnb {
        LNB_TYPES[0].to_lnb()
    }

    /// Parses a type name or `low[,high[,switch]]` in MHz.
    pub fn parse(s: &str) -> Option<Lnb> {
        if let Some(known) = LNB_TYPES.iter().find(|t| t.name.eq_ignore_ascii_case(s)) {
            return Some(known.to_lnb());
        }

        let mhz: Vec<u32> = s
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .ok()?;
        let (low, high, switch) = match mhz.as_slice() {
            [low] => (*low, 0, 0),
            [low, high] => (*low, *high, 0),
            [low, high, switch] => (*low, *high, *switch),
            _ => return None,
        };
        if low == 0 {
            return None;
        }
        Some(Lnb {
            name: s.to_string(),
            description: "user defined",
            low: low * 1000,
            high: (high != 0).then_some(high * 1000),
            switch: (switch != 0).then_some(switch * 1000),
        })
    }

    /// Maps a downlink frequency (kHz) to the frequency the tuner sees.
    pub fn intermediate_frequency(&self, frequency: u32, polarization: Polarization) -> IntermediateFrequency {
        match (self.high, self.switch) {
            (Some(high), Some(switch)) => {
                let hiband = frequency >= switch;
                let lo = if hiband { high } else { self.low };
                IntermediateFrequency {
                    frequency: frequency.abs_diff(lo),
                    hiband,
                }
            }
            // C-band multipoint: one oscillator per polarization
            (Some(high), None) => {
                let lo = if polarization.is_13v() { self.low } else { high };
                IntermediateFrequency {
                    frequency: frequency.abs_diff(lo),
                    hiband: false,
                }
            }
            _ => IntermediateFrequency {
                frequency: frequency.abs_diff(self.low),
                hiband: false,
            },
        }
    }
}

impl fmt::Display for Lnb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (LO {} MHz", self.name, self.low / 1000)?;
        if let Some(high) = self.high {
            write!(f, ", {} MHz", high / 1000)?;
        }
        if let Some(switch) = self.switch {
            write!(f, ", switch {} MHz", switch / 1000)?;
        }
        write!(f, ")")
    }
}
