//! Kinematic propeller pair for headless tests and demos.
//!
//! [`SimPropellerPair`] models an ideal governor: each shaft turns at exactly
//! its setpoint speed, and the follower setpoint is the nominal speed plus the
//! last correction, clamped to the governor band.  There is no inertia, drag
//! or turbulence, so every change in phase error comes from the controller or
//! from a deliberate main-shaft offset.
//!
//! # Example
//!
//! ```rust
//! use synchro_control::{PropellerPair, SimPropellerPair};
//!
//! let mut pair = SimPropellerPair::new(2400.0).with_phase_offset(0.1);
//! pair.apply_correction(5.0);
//! pair.advance(0.01);
//! let (_, follower_rpm) = pair.rpms();
//! assert!((follower_rpm - 2405.0).abs() < 1e-9);
//! ```

use synchro_types::rpm_to_rad_s;

use crate::plant::PropellerPair;

/// Default half-width of the follower governor's setpoint band, rpm.
pub const DEFAULT_GOVERNOR_BAND_RPM: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct SimPropellerPair {
    angle_main: f64,
    angle_follower: f64,
    nominal_rpm: f64,
    main_rpm: f64,
    follower_setpoint_rpm: f64,
    governor_band_rpm: f64,
}

impl SimPropellerPair {
    /// Both shafts at `nominal_rpm`, in phase, blade angles at zero.
    pub fn new(nominal_rpm: f64) -> Self {
        Self {
            angle_main: 0.0,
            angle_follower: 0.0,
            nominal_rpm,
            main_rpm: nominal_rpm,
            follower_setpoint_rpm: nominal_rpm,
            governor_band_rpm: DEFAULT_GOVERNOR_BAND_RPM,
        }
    }

    /// Start with the follower lagging the main shaft by `lag` radians.
    pub fn with_phase_offset(mut self, lag: f64) -> Self {
        self.angle_follower = self.angle_main - lag;
        self
    }

    /// Run the main shaft `delta_rpm` away from nominal.
    pub fn with_main_rpm_offset(mut self, delta_rpm: f64) -> Self {
        self.main_rpm = self.nominal_rpm + delta_rpm;
        self
    }

    /// Limit how far the follower setpoint may move from nominal, rpm.
    pub fn with_governor_band(mut self, band_rpm: f64) -> Self {
        self.governor_band_rpm = band_rpm.abs();
        self
    }

    pub fn nominal_rpm(&self) -> f64 {
        self.nominal_rpm
    }

    /// Nominal speed plus the last applied correction, within the band.
    pub fn follower_setpoint_rpm(&self) -> f64 {
        self.follower_setpoint_rpm
    }
}

impl PropellerPair for SimPropellerPair {
    fn blade_angles(&self) -> (f64, f64) {
        (self.angle_main, self.angle_follower)
    }

    fn angular_velocities(&self) -> (f64, f64) {
        (rpm_to_rad_s(self.main_rpm), rpm_to_rad_s(self.follower_setpoint_rpm))
    }

    fn apply_correction(&mut self, rpm_correction: f64) {
        let band = self.governor_band_rpm;
        self.follower_setpoint_rpm = (self.nominal_rpm + rpm_correction)
            .clamp(self.nominal_rpm - band, self.nominal_rpm + band);
    }

    fn advance(&mut self, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let (omega_main, omega_follower) = self.angular_velocities();
        self.angle_main += omega_main * dt;
        self.angle_follower += omega_follower * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_speeds_keep_phase_offset() {
        let mut pair = SimPropellerPair::new(2400.0).with_phase_offset(0.1);
        for _ in 0..1000 {
            pair.advance(0.01);
        }
        assert!((pair.measurement().phase_error() - 0.1).abs() < 1e-9);
        // Angles are accumulated, not wrapped.
        assert!(pair.blade_angles().0 > 2000.0);
    }

    #[test]
    fn correction_is_clamped_to_governor_band() {
        let mut pair = SimPropellerPair::new(2400.0).with_governor_band(10.0);
        pair.apply_correction(25.0);
        assert_eq!(pair.follower_setpoint_rpm(), 2410.0);
        pair.apply_correction(-25.0);
        assert_eq!(pair.follower_setpoint_rpm(), 2390.0);
        pair.apply_correction(3.0);
        assert_eq!(pair.follower_setpoint_rpm(), 2403.0);
    }

    #[test]
    fn main_offset_creates_phase_drift() {
        let mut pair = SimPropellerPair::new(2400.0).with_main_rpm_offset(1.0);
        pair.advance(1.0);
        // 1 rpm for 1 s is 1/60 of a turn.
        let expected = std::f64::consts::TAU / 60.0;
        assert!((pair.measurement().phase_error() - expected).abs() < 1e-9);
        let (main, follower) = pair.rpms();
        assert!((main - 2401.0).abs() < 1e-9);
        assert!((follower - 2400.0).abs() < 1e-9);
    }

    #[test]
    fn non_positive_or_non_finite_dt_does_not_move_shafts() {
        let mut pair = SimPropellerPair::new(2400.0);
        pair.advance(0.0);
        pair.advance(-1.0);
        pair.advance(f64::NAN);
        pair.advance(f64::INFINITY);
        assert_eq!(pair.blade_angles(), (0.0, 0.0));
    }
}
