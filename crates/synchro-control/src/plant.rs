//! `PropellerPair` trait: the seam between the controller and the shafts it
//! synchronises.
//!
//! The closed-loop driver only ever talks to this trait, so a simulator, a
//! hardware-in-the-loop rig or a recorded flight log can stand in for the
//! aircraft without touching the control code.

use synchro_types::rad_s_to_rpm;

use crate::synchrophaser::PhaseMeasurement;

/// A main/follower propeller pair whose follower governor accepts an rpm
/// correction.
pub trait PropellerPair {
    /// Accumulated `(main, follower)` blade angles, rad.
    fn blade_angles(&self) -> (f64, f64);

    /// `(main, follower)` angular velocities, rad/s.
    fn angular_velocities(&self) -> (f64, f64);

    /// Hand a correction (rpm) to the follower governor.  The governor adds it
    /// to its nominal setpoint and clamps to its own safe range.
    fn apply_correction(&mut self, rpm_correction: f64);

    /// Move the plant forward by `dt` seconds.
    fn advance(&mut self, dt: f64);

    /// Current readings packed for [`Synchrophaser::update`][crate::Synchrophaser::update].
    fn measurement(&self) -> PhaseMeasurement {
        let (main, follower) = self.blade_angles();
        let (omega_main, omega_follower) = self.angular_velocities();
        PhaseMeasurement::angles(main, follower).with_angular_velocities(omega_main, omega_follower)
    }

    /// `(main, follower)` shaft speeds in rpm.
    fn rpms(&self) -> (f64, f64) {
        let (omega_main, omega_follower) = self.angular_velocities();
        (rad_s_to_rpm(omega_main), rad_s_to_rpm(omega_follower))
    }
}
