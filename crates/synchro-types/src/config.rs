//! Immutable configuration records.
//!
//! Every record derives serde with `#[serde(default)]`, so a TOML file only
//! needs to name the values it changes.  Nothing here is trusted until
//! `validate()` has run; the controller constructors call it for you.

use serde::{Deserialize, Serialize};

use crate::error::SynchroError;

// ────────────────────────────────────────────────────────────────────────────
// Validation helpers
// ────────────────────────────────────────────────────────────────────────────

fn finite(field: &str, value: f64) -> Result<f64, SynchroError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SynchroError::invalid_config(
            field,
            format!("must be finite (got {value})"),
        ))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), SynchroError> {
    if finite(field, value)? < 0.0 {
        return Err(SynchroError::invalid_config(
            field,
            format!("must be >= 0 (got {value})"),
        ));
    }
    Ok(())
}

fn unit_interval(field: &str, value: f64) -> Result<(), SynchroError> {
    if !(0.0..=1.0).contains(&finite(field, value)?) {
        return Err(SynchroError::invalid_config(
            field,
            format!("must lie in [0, 1] (got {value})"),
        ));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Gains
// ────────────────────────────────────────────────────────────────────────────

/// A `(k_p, k_i, k_d)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainSet {
    pub k_p: f64,
    pub k_i: f64,
    pub k_d: f64,
}

impl GainSet {
    pub const fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self { k_p, k_i, k_d }
    }

    /// Move every gain a fraction `rate` of the way toward `target`:
    /// `k ← k + rate·(target_k − k)`.
    pub fn blend_toward(&mut self, target: &GainSet, rate: f64) {
        self.k_p += rate * (target.k_p - self.k_p);
        self.k_i += rate * (target.k_i - self.k_i);
        self.k_d += rate * (target.k_d - self.k_d);
    }

    fn validate(&self, name: &str) -> Result<(), SynchroError> {
        finite(&format!("{name}.k_p"), self.k_p)?;
        finite(&format!("{name}.k_i"), self.k_i)?;
        finite(&format!("{name}.k_d"), self.k_d)?;
        Ok(())
    }
}

/// Error regime selected by the adaptive scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainRegime {
    /// Large error: fast correction.
    Aggressive,
    Moderate,
    /// Small error: smooth settling.
    Conservative,
}

impl std::fmt::Display for GainRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GainRegime::Aggressive => write!(f, "aggressive"),
            GainRegime::Moderate => write!(f, "moderate"),
            GainRegime::Conservative => write!(f, "conservative"),
        }
    }
}

/// Which control law a synchrophaser runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerVariant {
    /// Constant-gain PID on phase error.
    #[default]
    Baseline,
    /// PID with error-scheduled, smoothly blended gains.
    Adaptive,
    /// PID on phase plus a frequency-error feed-forward term.
    PhaseFrequency,
}

impl std::fmt::Display for ControllerVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerVariant::Baseline => write!(f, "baseline"),
            ControllerVariant::Adaptive => write!(f, "adaptive"),
            ControllerVariant::PhaseFrequency => write!(f, "phase_frequency"),
        }
    }
}

impl std::str::FromStr for ControllerVariant {
    type Err = SynchroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" | "pid" => Ok(ControllerVariant::Baseline),
            "adaptive" => Ok(ControllerVariant::Adaptive),
            "phase_frequency" | "pfd" => Ok(ControllerVariant::PhaseFrequency),
            other => Err(SynchroError::invalid_config(
                "mode",
                format!("unknown controller variant '{other}'"),
            )),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ControllerConfig
// ────────────────────────────────────────────────────────────────────────────

/// Core PID configuration shared by all three controller variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Proportional gain.
    pub k_p: f64,
    /// Integral gain.
    pub k_i: f64,
    /// Derivative gain.
    pub k_d: f64,
    /// Lower anti-windup bound on the integrator (rad·s).
    pub integrator_min: f64,
    /// Upper anti-windup bound on the integrator (rad·s).
    pub integrator_max: f64,
    /// Phase correction (rad) to rpm correction factor.
    pub phase_scale: f64,
    /// Weight of the newest sample in the derivative low-pass filter.
    pub derivative_filter_alpha: f64,
    /// Errors below this magnitude (rad) are not corrected.
    pub deadband: f64,
    /// Maximum change of the correction, rpm per second.
    pub rate_limit: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            k_p: 1.0,
            k_i: 0.1,
            k_d: 0.5,
            integrator_min: -0.5,
            integrator_max: 0.5,
            phase_scale: 30.0,
            derivative_filter_alpha: 0.3,
            deadband: 0.01,
            rate_limit: 20.0,
        }
    }
}

impl ControllerConfig {
    /// The configured `(k_p, k_i, k_d)`.
    pub fn gains(&self) -> GainSet {
        GainSet::new(self.k_p, self.k_i, self.k_d)
    }

    /// Check every invariant of the record.
    ///
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), SynchroError> {
        self.gains().validate("controller")?;
        let min = finite("integrator_min", self.integrator_min)?;
        let max = finite("integrator_max", self.integrator_max)?;
        if min > max {
            return Err(SynchroError::invalid_config(
                "integrator_min",
                format!("must not exceed integrator_max ({min} > {max})"),
            ));
        }
        if finite("phase_scale", self.phase_scale)? <= 0.0 {
            return Err(SynchroError::invalid_config(
                "phase_scale",
                format!("must be > 0 (got {})", self.phase_scale),
            ));
        }
        unit_interval("derivative_filter_alpha", self.derivative_filter_alpha)?;
        non_negative("deadband", self.deadband)?;
        non_negative("rate_limit", self.rate_limit)?;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AdaptiveConfig
// ────────────────────────────────────────────────────────────────────────────

/// Gain-scheduling parameters for the adaptive variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Gains used while |error| > `large_error_threshold`.
    pub aggressive: GainSet,
    /// Gains used between the two thresholds.
    pub moderate: GainSet,
    /// Gains used while |error| < `small_error_threshold`.
    pub conservative: GainSet,
    /// Radians (about 2.9°).
    pub large_error_threshold: f64,
    /// Radians (about 1.1°).
    pub small_error_threshold: f64,
    /// Fraction of the remaining gap closed per tick, in (0, 1].
    pub gain_transition_rate: f64,
    /// Number of recent |error| samples kept for the rolling mean.
    pub error_window_capacity: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            aggressive: GainSet::new(1.5, 0.15, 0.7),
            moderate: GainSet::new(1.2, 0.12, 0.6),
            conservative: GainSet::new(0.9, 0.08, 0.4),
            large_error_threshold: 0.05,
            small_error_threshold: 0.02,
            gain_transition_rate: 0.1,
            error_window_capacity: 100,
        }
    }
}

impl AdaptiveConfig {
    /// Regime for an error of magnitude `error_magnitude`.
    ///
    /// Both thresholds are strict: an error exactly on a threshold is
    /// moderate.
    pub fn regime_for(&self, error_magnitude: f64) -> GainRegime {
        if error_magnitude > self.large_error_threshold {
            GainRegime::Aggressive
        } else if error_magnitude < self.small_error_threshold {
            GainRegime::Conservative
        } else {
            GainRegime::Moderate
        }
    }

    /// The fixed gain set belonging to `regime`.
    pub fn gains_for(&self, regime: GainRegime) -> GainSet {
        match regime {
            GainRegime::Aggressive => self.aggressive,
            GainRegime::Moderate => self.moderate,
            GainRegime::Conservative => self.conservative,
        }
    }

    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), SynchroError> {
        self.aggressive.validate("aggressive")?;
        self.moderate.validate("moderate")?;
        self.conservative.validate("conservative")?;
        non_negative("small_error_threshold", self.small_error_threshold)?;
        non_negative("large_error_threshold", self.large_error_threshold)?;
        if self.small_error_threshold > self.large_error_threshold {
            return Err(SynchroError::invalid_config(
                "small_error_threshold",
                format!(
                    "must not exceed large_error_threshold ({} > {})",
                    self.small_error_threshold, self.large_error_threshold
                ),
            ));
        }
        let rate = finite("gain_transition_rate", self.gain_transition_rate)?;
        if rate <= 0.0 || rate > 1.0 {
            return Err(SynchroError::invalid_config(
                "gain_transition_rate",
                format!("must lie in (0, 1] (got {rate})"),
            ));
        }
        if self.error_window_capacity == 0 {
            return Err(SynchroError::invalid_config(
                "error_window_capacity",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FrequencyConfig
// ────────────────────────────────────────────────────────────────────────────

/// Frequency-detector parameters for the phase-frequency variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyConfig {
    /// Gain on the filtered frequency error (dimensionless, applied in rad/s
    /// before the rpm conversion).
    pub k_f: f64,
    /// Weight of the newest sample in the frequency-error low-pass filter.
    pub filter_alpha: f64,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            k_f: 0.5,
            filter_alpha: 0.1,
        }
    }
}

impl FrequencyConfig {
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), SynchroError> {
        finite("k_f", self.k_f)?;
        unit_interval("filter_alpha", self.filter_alpha)?;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// KalmanConfig
// ────────────────────────────────────────────────────────────────────────────

/// Noise model and initial conditions of the phase Kalman filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Phase process noise, rad²/s.
    pub process_noise_phase: f64,
    /// Phase-rate process noise, (rad/s)²/s.
    pub process_noise_rate: f64,
    /// Measurement noise variance, rad².
    pub measurement_noise: f64,
    /// Starting phase estimate (wrapped on use).
    pub initial_phase: f64,
    /// Starting phase-rate estimate, rad/s.
    pub initial_rate: f64,
    /// Diagonal of the starting covariance.
    pub initial_covariance: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_noise_phase: 0.001,
            process_noise_rate: 0.01,
            measurement_noise: 0.02,
            initial_phase: 0.0,
            initial_rate: 0.0,
            initial_covariance: 0.1,
        }
    }
}

impl KalmanConfig {
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), SynchroError> {
        non_negative("process_noise_phase", self.process_noise_phase)?;
        non_negative("process_noise_rate", self.process_noise_rate)?;
        non_negative("measurement_noise", self.measurement_noise)?;
        finite("initial_phase", self.initial_phase)?;
        finite("initial_rate", self.initial_rate)?;
        if finite("initial_covariance", self.initial_covariance)? <= 0.0 {
            return Err(SynchroError::invalid_config(
                "initial_covariance",
                format!("must be > 0 (got {})", self.initial_covariance),
            ));
        }
        Ok(())
    }
}
