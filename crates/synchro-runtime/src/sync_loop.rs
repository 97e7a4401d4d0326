//! Closed-loop tick driver.
//!
//! [`SyncLoop`] wires a [`Synchrophaser`] (and optionally a
//! [`PhaseKalmanFilter`]) to any [`PropellerPair`].  Each
//! [`step`][SyncLoop::step] reads the plant, runs the controller, hands the
//! correction to the follower governor, advances the plant and returns a
//! [`TickRecord`].
//!
//! # Example
//!
//! ```rust
//! use synchro_control::{SimPropellerPair, Synchrophaser};
//! use synchro_runtime::SyncLoop;
//! use synchro_types::ControllerConfig;
//!
//! let plant = SimPropellerPair::new(2400.0).with_phase_offset(0.1);
//! let controller = Synchrophaser::baseline(ControllerConfig::default()).unwrap();
//! let mut sync_loop = SyncLoop::new(plant, controller);
//! sync_loop.controller_mut().enable();
//!
//! let records = sync_loop.run(5.0, 0.01);
//! assert_eq!(records.len(), 500);
//! assert!(records.last().unwrap().phase_error.abs() < 0.05);
//! ```

use serde::Serialize;
use synchro_control::{PropellerPair, Synchrophaser};
use synchro_estimation::PhaseKalmanFilter;
use synchro_types::SynchroError;
use tracing::info;

use crate::config::SynchroConfig;

/// What happened on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickRecord {
    /// Loop time at the end of the tick, s.
    pub time: f64,
    /// Wrapped phase error read at the start of the tick, rad.
    pub phase_error: f64,
    pub rpm_correction: f64,
    /// Shaft speeds after the correction was applied.
    pub rpm_main: f64,
    pub rpm_follower: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_phase_error: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_phase_rate: Option<f64>,
}

/// Drives a [`Synchrophaser`] against a [`PropellerPair`], one tick at a time.
pub struct SyncLoop<P: PropellerPair> {
    plant: P,
    controller: Synchrophaser,
    estimator: Option<PhaseKalmanFilter>,
    time: f64,
    locked: bool,
}

impl<P: PropellerPair> SyncLoop<P> {
    /// Loop at time 0 with no estimator.
    pub fn new(plant: P, controller: Synchrophaser) -> Self {
        Self {
            plant,
            controller,
            estimator: None,
            time: 0.0,
            locked: false,
        }
    }

    /// Also run every measured phase error through `estimator`.
    pub fn with_estimator(mut self, estimator: PhaseKalmanFilter) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Build the controller and optional filter from `config`.  The
    /// controller starts disabled.
    ///
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] if `config` fails validation.
    pub fn from_config(plant: P, config: &SynchroConfig) -> Result<Self, SynchroError> {
        config.validate()?;
        let mut sync_loop = Self::new(plant, config.build_synchrophaser()?);
        sync_loop.estimator = config.build_kalman()?;
        Ok(sync_loop)
    }

    /// Run one tick of length `dt` seconds.  A non-finite `dt` counts as 0.
    pub fn step(&mut self, dt: f64) -> TickRecord {
        let dt = if dt.is_finite() { dt } else { 0.0 };
        let measurement = self.plant.measurement();
        let phase_error = measurement.phase_error();

        let rpm_correction = self.controller.update(&measurement, dt);
        self.plant.apply_correction(rpm_correction);
        self.plant.advance(dt);
        if dt > 0.0 {
            self.time += dt;
        }

        let estimate = self
            .estimator
            .as_mut()
            .map(|kf| kf.filter(phase_error, dt));

        self.track_lock(phase_error);

        let (rpm_main, rpm_follower) = self.plant.rpms();
        TickRecord {
            time: self.time,
            phase_error,
            rpm_correction,
            rpm_main,
            rpm_follower,
            estimated_phase_error: estimate.map(|(phase, _)| phase),
            estimated_phase_rate: estimate.map(|(_, rate)| rate),
        }
    }

    /// Step for `duration` seconds in ticks of `dt`.  Returns no records if
    /// `dt` is not a positive finite number.
    pub fn run(&mut self, duration: f64, dt: f64) -> Vec<TickRecord> {
        if !dt.is_finite() || dt <= 0.0 || !duration.is_finite() || duration <= 0.0 {
            return Vec::new();
        }
        let ticks = (duration / dt).round() as usize;
        (0..ticks).map(|_| self.step(dt)).collect()
    }

    fn track_lock(&mut self, phase_error: f64) {
        let locked =
            self.controller.is_enabled() && phase_error.abs() < self.controller.config().deadband;
        if locked == self.locked {
            return;
        }
        self.locked = locked;
        if locked {
            info!(time = self.time, "phase lock acquired");
        } else {
            info!(
                time = self.time,
                phase_error_deg = phase_error.to_degrees(),
                "phase lock lost"
            );
        }
    }

    /// `true` while the controller is enabled and the last measured error was
    /// inside the deadband.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Accumulated loop time, s.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn plant(&self) -> &P {
        &self.plant
    }

    /// Mutable plant access, e.g. to inject a speed step mid-run.
    pub fn plant_mut(&mut self) -> &mut P {
        &mut self.plant
    }

    pub fn controller(&self) -> &Synchrophaser {
        &self.controller
    }

    /// Mutable controller access, used to enable or disable it.
    pub fn controller_mut(&mut self) -> &mut Synchrophaser {
        &mut self.controller
    }

    pub fn estimator(&self) -> Option<&PhaseKalmanFilter> {
        self.estimator.as_ref()
    }
}
