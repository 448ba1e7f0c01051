//! Tuning a frontend and waiting for lock.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use dvbscan_si::FrontendParameters;
use log::{debug, error, info, warn};

use crate::delivery::DeliverySystem;
use crate::error::{DeviceResultExt, ScanError};
use crate::tuner::diseqc::{self, Rotor, SwitchConfig};
use crate::tuner::lnb::Lnb;
use crate::tuner::{Frontend, FrontendInfo};

/// Every wait of the scan, so tests can run without sleeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    /// Between two lock polls of a regular tune.
    pub lock_poll: Duration,
    /// Settle time after programming a sweep candidate.
    pub sweep_settle: Duration,
    pub sweep_poll: Duration,
    /// Settle time after programming an initial tuning data entry.
    pub replay_settle: Duration,
    pub replay_poll: Duration,
    /// After switching LNB band or polarization.
    pub switch_settle: Duration,
    pub diseqc_gap: Duration,
    pub rotor_per_degree: Duration,
    /// Table repetition rates are multiplied by this to get filter timeouts.
    pub filter_unit: Duration,
    /// Longest single wait for section data.
    pub demux_poll: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing {
            lock_poll: Duration::from_millis(200),
            sweep_settle: Duration::from_secs(1),
            sweep_poll: Duration::from_millis(150),
            replay_settle: Duration::from_millis(1500),
            replay_poll: Duration::from_millis(200),
            switch_settle: Duration::from_millis(50),
            diseqc_gap: diseqc::COMMAND_GAP,
            rotor_per_degree: diseqc::rotor_time_per_degree(),
            filter_unit: Duration::from_secs(1),
            demux_poll: Duration::from_secs(1),
        }
    }
}

/// Result of one tuning attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneOutcome {
    Locked,
    NoSignal,
    /// The frontend cannot tune these parameters; not a tuning failure.
    Skipped,
}

/// Result of programming the frontend, before any lock wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Programmed {
    Tuned,
    /// The driver rejected the parameters.
    Failed,
    Skipped,
}

/// Satellite equipment between dish and tuner.
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteSetup {
    pub lnb: Lnb,
    pub switch: SwitchConfig,
    pub rotor: Option<Rotor>,
}

impl Default for SatelliteSetup {
    fn default() -> Self {
        SatelliteSetup {
            lnb: Lnb::universal(),
            switch: SwitchConfig::default(),
            rotor: None,
        }
    }
}

pub struct Tuner<F> {
    frontend: F,
    satellite: SatelliteSetup,
    /// Lock wait multiplier, 1 to 3.
    tuning_timeout: u32,
    pacing: Pacing,
    started: DateTime<Local>,
}

impl<F: Frontend> Tuner<F> {
    pub fn new(frontend: F, satellite: SatelliteSetup, tuning_timeout: u32, pacing: Pacing) -> Self {
        Tuner {
            frontend,
            satellite,
            tuning_timeout: tuning_timeout.clamp(1, 3),
            pacing,
            started: Local::now(),
        }
    }

    /// Run time so far as `mm:ss`.
    pub fn elapsed(&self) -> String {
        let seconds = (Local::now() - self.started).num_seconds().max(0);
        format!("{:02}:{:02}", seconds / 60, seconds % 60)
    }

    pub fn info(&self) -> &FrontendInfo {
        self.frontend.info()
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    /// Programs the frontend without waiting for lock.
    pub fn set_frontend(&mut self, params: &FrontendParameters) -> Result<Programmed, ScanError> {
        let frontend_type = self.frontend.info().frontend_type;
        if params.frontend_type() != frontend_type {
            warn!(
                "Frontend type ({}) is not compatible with requested tuning type ({})",
                frontend_type,
                params.frontend_type()
            );
            return Ok(Programmed::Skipped);
        }

        let band = match params {
            FrontendParameters::Satellite(p) => Some((
                self.satellite.lnb.intermediate_frequency(p.frequency, p.polarization),
                !p.polarization.is_13v(),
            )),
            _ => None,
        };
        let frequency = band.map_or(params.frequency(), |(if_, _)| if_.frequency);

        if let Err(reason) = frontend_type.check_capabilities(params, frequency, self.frontend.info()) {
            info!("Skipping {}: {}", params, reason);
            return Ok(Programmed::Skipped);
        }

        if let Some((if_, voltage_18)) = band {
            if let Some(rotor) = &mut self.satellite.rotor {
                rotor
                    .rotate(&mut self.frontend, self.pacing.diseqc_gap, self.pacing.rotor_per_degree)
                    .during("DiSEqC positioner")?;
            }
            diseqc::setup_switch(
                &mut self.frontend,
                self.satellite.switch,
                voltage_18,
                if_.hiband,
                self.pacing.diseqc_gap,
            )
            .during("DiSEqC switch")?;
            thread::sleep(self.pacing.switch_settle);
            debug!(
                "LNB {}: IF {} kHz, {} band",
                self.satellite.lnb.name,
                if_.frequency,
                if if_.hiband { "high" } else { "low" }
            );
        }

        let properties = frontend_type.tune_properties(params, frequency);
        if let Err(e) = self.frontend.set_properties(&properties) {
            error!("Setting frontend parameters failed: {}", e);
            return Ok(Programmed::Failed);
        }
        Ok(Programmed::Tuned)
    }

    /// Polls the frontend status up to `samples` times, `interval` apart.
    pub fn wait_for_lock(&mut self, samples: usize, interval: Duration) -> Result<bool, ScanError> {
        for _ in 0..samples {
            let status = self.frontend.read_status().during("FE_READ_STATUS")?;
            if status.has_lock() {
                let signal = self.frontend.signal_strength().unwrap_or(0);
                let snr = self.frontend.snr().unwrap_or(0);
                debug!("status {} | signal {:04x} | snr {:04x}", status.flags(), signal, snr);
                return Ok(true);
            }
            thread::sleep(interval);
        }
        Ok(false)
    }

    /// Programs `params` and waits for lock.
    ///
    /// With `announce`, the attempt is logged at info level.
    pub fn tune(&mut self, params: &FrontendParameters, announce: bool) -> Result<TuneOutcome, ScanError> {
        if params.frequency() == 0 {
            return Ok(TuneOutcome::NoSignal);
        }
        if announce {
            info!("tune to: {} (time: {})", params, self.elapsed());
        } else {
            debug!("tune to: {} (time: {})", params, self.elapsed());
        }

        match self.set_frontend(params)? {
            Programmed::Skipped => return Ok(TuneOutcome::Skipped),
            Programmed::Failed => return Ok(TuneOutcome::NoSignal),
            Programmed::Tuned => {}
        }

        let samples = 5 * self.tuning_timeout as usize;
        if self.wait_for_lock(samples, self.pacing.lock_poll)? {
            Ok(TuneOutcome::Locked)
        } else {
            if announce {
                info!("----------no signal----------");
            }
            Ok(TuneOutcome::NoSignal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fast_pacing, MockFrontend, World};
    use dvbscan_si::*;

    fn terrestrial(frequency: u32) -> FrontendParameters {
        FrontendParameters::Terrestrial(TerrestrialParams {
            frequency,
            bandwidth: Bandwidth::Mhz8,
            ..Default::default()
        })
    }

    fn tuner(world: &World, frontend_type: FrontendType) -> Tuner<MockFrontend> {
        Tuner::new(
            MockFrontend::new(world.clone(), frontend_type),
            SatelliteSetup::default(),
            1,
            fast_pacing(),
        )
    }

    #[test]
    fn test_tune_locks() {
        let world = World::new();
        world.lock(474_000_000);
        let mut tuner = tuner(&world, FrontendType::Terrestrial);
        assert_eq!(tuner.tune(&terrestrial(474_000_000), true).unwrap(), TuneOutcome::Locked);
        assert_eq!(tuner.tune(&terrestrial(482_000_000), true).unwrap(), TuneOutcome::NoSignal);
        assert_eq!(world.tune_log(), vec![474_000_000, 482_000_000]);
    }

    #[test]
    fn test_zero_frequency_never_programs() {
        let world = World::new();
        let mut tuner = tuner(&world, FrontendType::Terrestrial);
        assert_eq!(tuner.tune(&terrestrial(0), false).unwrap(), TuneOutcome::NoSignal);
        assert!(world.tune_log().is_empty());
    }

    #[test]
    fn test_wrong_delivery_system_skipped() {
        let world = World::new();
        let mut tuner = tuner(&world, FrontendType::Cable);
        assert_eq!(tuner.tune(&terrestrial(474_000_000), true).unwrap(), TuneOutcome::Skipped);
        assert!(world.tune_log().is_empty());
    }

    #[test]
    fn test_satellite_tunes_intermediate_frequency() {
        let world = World::new();
        world.lock(1_588_000);
        let mut tuner = Tuner::new(
            MockFrontend::new(world.clone(), FrontendType::Satellite),
            SatelliteSetup {
                switch: SwitchConfig {
                    committed: Some(1),
                    uncommitted: None,
                },
                ..Default::default()
            },
            1,
            fast_pacing(),
        );
        let params = FrontendParameters::Satellite(SatelliteParams {
            frequency: 12_188_000,
            polarization: Polarization::Horizontal,
            symbol_rate: 27_500_000,
            ..Default::default()
        });
        assert_eq!(tuner.tune(&params, true).unwrap(), TuneOutcome::Locked);
        assert_eq!(world.tune_log(), vec![1_588_000]);
        // port 1, 18 V, high band
        assert_eq!(world.diseqc_log(), vec![vec![0xE0, 0x10, 0x38, 0xF7]]);
    }
}
