//! Phase arithmetic and unit conversions.
//!
//! Blade angles arrive accumulated and unbounded (a shaft at 2400 rpm gains
//! roughly 250 rad every second), so every comparison between two angles goes
//! through [`wrap_phase`] first.
//!
//! # Wrap convention
//!
//! The wrapped range is the half-open interval `(-π, π]`.  An input that lands
//! exactly on the boundary maps to `+π`; `-π` is never produced.  The
//! controllers and the Kalman filter all use this one function.
//!
//! ```rust
//! use synchro_types::phase::phase_error;
//!
//! // 350° − 10° is a 20° lag, not a 340° lead.
//! let e = phase_error(350f64.to_radians(), 10f64.to_radians());
//! assert!((e - (-20f64).to_radians()).abs() < 1e-12);
//! ```

use std::f64::consts::{PI, TAU};

/// Wrap `angle` (radians) into `(-π, π]`.
///
/// Non-finite input propagates as `NaN`; it is never rejected.
pub fn wrap_phase(angle: f64) -> f64 {
    // rem_euclid lands in [0, 2π]; the upper end only appears through
    // rounding and folds to 0 below.
    let r = angle.rem_euclid(TAU);
    if r > PI { r - TAU } else { r }
}

/// Signed phase difference `main − follower`, wrapped into `(-π, π]`.
///
/// Positive means the main blade leads, i.e. the follower must speed up.
pub fn phase_error(angle_main: f64, angle_follower: f64) -> f64 {
    wrap_phase(angle_main - angle_follower)
}

/// Convert revolutions per minute to radians per second.
pub fn rpm_to_rad_s(rpm: f64) -> f64 {
    rpm * TAU / 60.0
}

/// Convert radians per second to revolutions per minute.
pub fn rad_s_to_rpm(omega: f64) -> f64 {
    omega * 60.0 / TAU
}
