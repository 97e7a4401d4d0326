//! Phase Kalman filter.
//!
//! Estimates the phase error between two shafts and its rate of change from
//! noisy phase measurements, using a constant-rate model:
//!
//! ```text
//! x = [phase, rate]ᵀ      F = [[1, dt], [0, 1]]      H = [1, 0]
//!
//! predict:  x ← F·x          P ← F·P·Fᵀ + Q·dt
//! update:   y = wrap(z − H·x)
//!           S = H·P·Hᵀ + R    K = P·Hᵀ / S
//!           x ← x + K·y       P ← (I − K·H)·P
//! ```
//!
//! The phase component is wrapped into `(-π, π]` after every step, and so is
//! the innovation, so a measurement just across the ±π seam is read as a
//! small correction instead of a full turn.
//!
//! # Example
//!
//! ```rust
//! use synchro_estimation::PhaseKalmanFilter;
//! use synchro_types::KalmanConfig;
//!
//! let mut kf = PhaseKalmanFilter::new(KalmanConfig::default()).unwrap();
//! let (phase, _rate) = kf.filter(0.2, 0.01);
//! assert!(phase > 0.0 && phase < 0.2);
//! ```

use nalgebra::{Matrix2, RowVector2, Vector2};
use serde::Serialize;
use synchro_types::{KalmanConfig, SynchroError, wrap_phase};
use tracing::{trace, warn};

/// Summary of the filter's current belief.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KalmanStats {
    pub phase_estimate: f64,
    pub rate_estimate: f64,
    /// √P[0,0], rad.
    pub phase_std: f64,
    /// √P[1,1], rad/s.
    pub rate_std: f64,
    /// Last innovation (wrapped), rad.
    pub innovation: f64,
    /// √S of the last update, rad.
    pub innovation_std: f64,
    pub update_count: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// PhaseKalmanFilter
// ────────────────────────────────────────────────────────────────────────────

/// Two-state (phase, rate) Kalman filter for the inter-shaft phase error.
#[derive(Debug, Clone)]
pub struct PhaseKalmanFilter {
    config: KalmanConfig,
    state: Vector2<f64>,
    covariance: Matrix2<f64>,
    process_noise: Matrix2<f64>,
    measurement_noise: f64,
    innovation: f64,
    innovation_variance: f64,
    update_count: u64,
}

impl PhaseKalmanFilter {
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: KalmanConfig) -> Result<Self, SynchroError> {
        config.validate()?;
        let process_noise =
            Matrix2::from_diagonal(&Vector2::new(config.process_noise_phase, config.process_noise_rate));
        let mut filter = Self {
            state: Vector2::zeros(),
            covariance: Matrix2::zeros(),
            process_noise,
            measurement_noise: config.measurement_noise,
            innovation: 0.0,
            innovation_variance: 0.0,
            update_count: 0,
            config,
        };
        filter.reset(filter.config.initial_phase, filter.config.initial_rate);
        Ok(filter)
    }

    /// Restore the state to `(phase, rate)` and the covariance to its initial
    /// value, and forget the innovation history.
    pub fn reset(&mut self, phase: f64, rate: f64) {
        self.state = Vector2::new(wrap_phase(phase), rate);
        self.covariance = Matrix2::identity() * self.config.initial_covariance;
        self.innovation = 0.0;
        self.innovation_variance = 0.0;
        self.update_count = 0;
    }

    /// Propagate the state `dt` seconds forward.  A non-finite `dt` is a
    /// no-op.
    pub fn predict(&mut self, dt: f64) {
        if !dt.is_finite() {
            return;
        }
        let f = Matrix2::new(1.0, dt, 0.0, 1.0);
        self.state = f * self.state;
        self.state[0] = wrap_phase(self.state[0]);
        self.covariance = f * self.covariance * f.transpose() + self.process_noise * dt;
    }

    /// Fold in one phase measurement (rad, any range).
    ///
    /// A non-finite measurement is ignored.  If the innovation variance is not
    /// positive the correction is skipped, but the innovation is still
    /// recorded.
    pub fn update(&mut self, measured_phase: f64) {
        let z = wrap_phase(measured_phase);
        if !z.is_finite() {
            trace!(measured_phase, "non-finite phase measurement ignored");
            return;
        }

        let h = RowVector2::new(1.0, 0.0);
        let innovation = wrap_phase(z - (h * self.state)[0]);
        let s = (h * self.covariance * h.transpose())[0] + self.measurement_noise;

        self.innovation = innovation;
        self.innovation_variance = s;
        self.update_count += 1;

        if s.is_nan() || s <= 0.0 {
            warn!(innovation_variance = s, "degenerate innovation variance, skipping correction");
            return;
        }

        let gain = self.covariance * h.transpose() / s;
        self.state += gain * innovation;
        self.state[0] = wrap_phase(self.state[0]);
        self.covariance = (Matrix2::identity() - gain * h) * self.covariance;
    }

    /// Predict (skipped when `dt ≤ 0` or not finite) then update.  Returns
    /// `(phase_estimate, rate_estimate)`.
    pub fn filter(&mut self, measured_phase: f64, dt: f64) -> (f64, f64) {
        let dt = if dt.is_finite() { dt } else { 0.0 };
        if dt > 0.0 {
            self.predict(dt);
        }
        self.update(measured_phase);
        (self.phase_estimate(), self.rate_estimate())
    }

    /// Filtered phase error, rad, in `(-π, π]`.
    pub fn phase_estimate(&self) -> f64 {
        self.state[0]
    }

    /// Filtered phase rate, rad/s.
    pub fn rate_estimate(&self) -> f64 {
        self.state[1]
    }

    /// √P[0,0], rad.
    pub fn phase_uncertainty(&self) -> f64 {
        self.covariance[(0, 0)].max(0.0).sqrt()
    }

    /// Current state covariance `P`.
    pub fn covariance(&self) -> &Matrix2<f64> {
        &self.covariance
    }

    /// Wrapped innovation of the last update, rad.
    pub fn innovation(&self) -> f64 {
        self.innovation
    }

    pub fn config(&self) -> &KalmanConfig {
        &self.config
    }

    /// Snapshot of the current estimate and its uncertainty.
    pub fn stats(&self) -> KalmanStats {
        KalmanStats {
            phase_estimate: self.phase_estimate(),
            rate_estimate: self.rate_estimate(),
            phase_std: self.phase_uncertainty(),
            rate_std: self.covariance[(1, 1)].max(0.0).sqrt(),
            innovation: self.innovation,
            innovation_std: self.innovation_variance.max(0.0).sqrt(),
            update_count: self.update_count,
        }
    }
}
