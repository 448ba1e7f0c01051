//! DiSEqC switch and positioner control.

use std::io;
use std::thread;
use std::time::Duration;

use log::info;

use super::{Frontend, SecVoltage, ToneBurst};

/// Gap the bus needs between two commands.
pub const COMMAND_GAP: Duration = Duration::from_millis(15);

/// Positioner speed estimate, degrees per second.
pub const ROTOR_DEGREES_PER_SECOND: f64 = 2.4;

/// DiSEqC 1.0 "write N0": committed switch port 0..=3.
pub fn committed_switch(position: u8, voltage_18: bool, hiband: bool) -> [u8; 4] {
    [
        0xE0,
        0x10,
        0x38,
        0xF0 | (position & 0x03) << 2 | (voltage_18 as u8) << 1 | hiband as u8,
    ]
}

/// DiSEqC 1.1 "write N1": uncommitted switch port 0..=15.
pub fn uncommitted_switch(position: u8) -> [u8; 4] {
    [0xE0, 0x10, 0x39, 0xF0 | (position & 0x0F)]
}

/// DiSEqC 1.2 "goto stored position".
pub fn goto_position(position: u8) -> [u8; 4] {
    [0xE0, 0x31, 0x6B, position]
}

/// Switch ports in front of the LNB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwitchConfig {
    pub committed: Option<u8>,
    pub uncommitted: Option<u8>,
}

/// Sets polarization voltage and band tone, addressing the switches on the way.
pub fn setup_switch<F: Frontend + ?Sized>(
    frontend: &mut F,
    switch: SwitchConfig,
    voltage_18: bool,
    hiband: bool,
    gap: Duration,
) -> io::Result<()> {
    frontend.set_tone(false)?;
    frontend.set_voltage(if voltage_18 { SecVoltage::V18 } else { SecVoltage::V13 })?;
    thread::sleep(gap);

    if let Some(port) = switch.uncommitted {
        frontend.send_diseqc(&uncommitted_switch(port))?;
        thread::sleep(gap);
    }
    if let Some(port) = switch.committed {
        frontend.send_diseqc(&committed_switch(port, voltage_18, hiband))?;
        thread::sleep(gap);
        frontend.send_burst(if port % 2 == 1 { ToneBurst::B } else { ToneBurst::A })?;
        thread::sleep(gap);
    }

    frontend.set_tone(hiband)?;
    thread::sleep(gap);
    Ok(())
}

/// Positioner state across tunes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotor {
    /// Stored position to drive to.
    pub position: u8,
    /// Orbital position of the satellite at that slot, degrees east.
    pub orbital_position: f64,
    /// Where the dish points now, if known.
    pub current: Option<f64>,
}

impl Rotor {
    pub fn new(position: u8, orbital_position: f64) -> Self {
        Rotor {
            position,
            orbital_position,
            current: None,
        }
    }

    /// Degrees the dish has to turn; a dish in unknown position may need half a turn.
    pub fn travel(&self) -> f64 {
        match self.current {
            Some(current) => (self.orbital_position - current).abs(),
            None => 180.0,
        }
    }

    /// Drives the positioner to the stored position and waits for the move.
    ///
    /// `per_degree` is the time budget per degree of travel.
    pub fn rotate<F: Frontend + ?Sized>(
        &mut self,
        frontend: &mut F,
        gap: Duration,
        per_degree: Duration,
    ) -> io::Result<()> {
        let travel = self.travel();
        if self.current.is_some() && travel == 0.0 {
            return Ok(());
        }

        frontend.set_tone(false)?;
        frontend.set_voltage(SecVoltage::V18)?;
        thread::sleep(gap);
        // sent twice
        for _ in 0..2 {
            frontend.send_diseqc(&goto_position(self.position))?;
            thread::sleep(gap);
        }

        info!(
            "Rotating to position {} ({:.1}°), waiting {:.0}s",
            self.position,
            travel,
            per_degree.as_secs_f64() * travel
        );
        thread::sleep(per_degree.mul_f64(travel));
        self.current = Some(self.orbital_position);
        Ok(())
    }
}

/// Time budget per degree at the nominal positioner speed.
pub fn rotor_time_per_degree() -> Duration {
    Duration::from_secs_f64(1.0 / ROTOR_DEGREES_PER_SECOND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_committed_switch_bytes() {
        let fourth: Vec<u8> = (0..8u8)
            .map(|index| committed_switch(index / 4, index & 1 != 0, index & 2 != 0)[3])
            .collect();
        assert_eq!(fourth, vec![0xF0, 0xF2, 0xF1, 0xF3, 0xF4, 0xF6, 0xF5, 0xF7]);
        assert_eq!(committed_switch(3, true, true), [0xE0, 0x10, 0x38, 0xFF]);
    }

    #[test]
    fn test_uncommitted_switch_bytes() {
        assert_eq!(uncommitted_switch(0), [0xE0, 0x10, 0x39, 0xF0]);
        assert_eq!(uncommitted_switch(15), [0xE0, 0x10, 0x39, 0xFF]);
    }

    #[test]
    fn test_rotor_travel() {
        let mut rotor = Rotor::new(3, 19.2);
        assert_eq!(rotor.travel(), 180.0);
        rotor.current = Some(13.0);
        assert!((rotor.travel() - 6.2).abs() < 1e-9);
        assert_eq!(goto_position(3), [0xE0, 0x31, 0x6B, 3]);
    }
}
