//! Shared PID core of every synchrophaser variant.
//!
//! [`PidCore`] turns a wrapped phase error into a bounded rpm correction.  It
//! does not decide *which* gains to use or whether a feed-forward term
//! exists; the caller passes both in on every tick, which is how the
//! constant-gain, adaptive and phase-frequency strategies share one
//! implementation of the safety mechanisms:
//!
//! 1. deadband (with slow integrator decay while inside it),
//! 2. clamped integrator (anti-windup),
//! 3. low-pass filtered derivative,
//! 4. rate-limited output,
//! 5. hard output clamp at ±[`OUTPUT_LIMIT_RPM`].
//!
//! # Example
//!
//! ```rust
//! use synchro_control::pid::PidCore;
//! use synchro_types::ControllerConfig;
//!
//! let config = ControllerConfig::default();
//! let gains = config.gains();
//! let mut core = PidCore::new(config).unwrap();
//! core.set_enabled(true);
//!
//! let rpm = core.step(0.1, gains, 0.0, 0.01);
//! assert!(rpm > 0.0 && rpm <= 0.2 + 1e-12); // 20 rpm/s · 10 ms
//! ```

use synchro_types::{ControllerConfig, GainSet, SynchroError};

/// Absolute bound on the rpm correction handed to the governor.
pub const OUTPUT_LIMIT_RPM: f64 = 15.0;

/// Per-tick integrator decay factor while the error sits in the deadband.
const DEADBAND_INTEGRATOR_DECAY: f64 = 0.99;

// ────────────────────────────────────────────────────────────────────────────
// State records
// ────────────────────────────────────────────────────────────────────────────

/// Running statistics over |raw phase error|, deadband ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorStats {
    pub max_abs_error: f64,
    pub cumulative_abs_error: f64,
    pub update_count: u64,
}

impl ErrorStats {
    fn record(&mut self, abs_error: f64) {
        self.update_count += 1;
        self.cumulative_abs_error += abs_error;
        self.max_abs_error = self.max_abs_error.max(abs_error);
    }

    /// Mean |raw phase error|, or 0 before the first tick.
    pub fn mean_abs_error(&self) -> f64 {
        if self.update_count == 0 {
            0.0
        } else {
            self.cumulative_abs_error / self.update_count as f64
        }
    }
}

/// Accumulators owned by exactly one controller instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    pub enabled: bool,
    pub integrator: f64,
    pub previous_error: f64,
    pub filtered_derivative: f64,
    pub previous_output: f64,
    pub stats: ErrorStats,
}

/// Values of the most recent tick, kept for diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidTerms {
    /// Post-deadband error, rad.
    pub phase_error: f64,
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
    pub rpm_correction: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// PidCore
// ────────────────────────────────────────────────────────────────────────────

/// Configuration, accumulators and last-tick terms of one PID loop.
#[derive(Debug, Clone)]
pub struct PidCore {
    config: ControllerConfig,
    state: ControllerState,
    terms: PidTerms,
}

impl PidCore {
    /// Build a disabled core.
    ///
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: ControllerConfig) -> Result<Self, SynchroError> {
        config.validate()?;
        let mut core = Self {
            config,
            state: ControllerState::default(),
            terms: PidTerms::default(),
        };
        core.reset_transient();
        Ok(core)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// P, I and D contributions of the last tick.
    pub fn terms(&self) -> &PidTerms {
        &self.terms
    }

    /// Set the enabled flag and wipe every transient accumulator, so nothing
    /// from a previous active period leaks into the next one.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.state.enabled = enabled;
        self.reset_transient();
    }

    /// Clear max/mean/count statistics.
    pub fn reset_stats(&mut self) {
        self.state.stats = ErrorStats::default();
    }

    /// Zero the last-tick terms (used on disabled ticks).
    pub fn clear_terms(&mut self) {
        self.terms = PidTerms::default();
    }

    fn reset_transient(&mut self) {
        // Zero unless the configured bounds exclude it.
        self.state.integrator = 0.0_f64.clamp(self.config.integrator_min, self.config.integrator_max);
        self.state.previous_error = 0.0;
        self.state.filtered_derivative = 0.0;
        self.state.previous_output = 0.0;
        self.terms = PidTerms::default();
    }

    /// Run one control tick and return the rpm correction.
    ///
    /// - `raw_error` – wrapped phase error, rad.
    /// - `gains` – gains to use for this tick.
    /// - `feedforward_rpm` – added to the PID rpm before rate limiting.
    /// - `dt` – seconds since the previous tick.  `dt ≤ 0` skips the
    ///   derivative and the rate limiter instead of dividing by zero.
    ///
    /// Does not look at the enabled flag; the caller gates on it.
    pub fn step(&mut self, raw_error: f64, gains: GainSet, feedforward_rpm: f64, dt: f64) -> f64 {
        let cfg = &self.config;
        let state = &mut self.state;

        let active_error = if raw_error.abs() < cfg.deadband {
            state.integrator = (state.integrator * DEADBAND_INTEGRATOR_DECAY)
                .clamp(cfg.integrator_min, cfg.integrator_max);
            0.0
        } else {
            raw_error
        };

        state.stats.record(raw_error.abs());

        let proportional = gains.k_p * active_error;

        if active_error != 0.0 {
            state.integrator = (state.integrator + active_error * dt)
                .clamp(cfg.integrator_min, cfg.integrator_max);
        }
        let integral = gains.k_i * state.integrator;

        let derivative = if dt > 0.0 {
            let raw_derivative = (active_error - state.previous_error) / dt;
            let alpha = cfg.derivative_filter_alpha;
            state.filtered_derivative =
                alpha * raw_derivative + (1.0 - alpha) * state.filtered_derivative;
            gains.k_d * state.filtered_derivative
        } else {
            0.0
        };
        state.previous_error = active_error;

        let desired_rpm = (proportional + integral + derivative) * cfg.phase_scale + feedforward_rpm;

        let limited = if dt > 0.0 {
            let max_step = cfg.rate_limit * dt;
            state.previous_output + (desired_rpm - state.previous_output).clamp(-max_step, max_step)
        } else {
            desired_rpm
        };

        let output = limited.clamp(-OUTPUT_LIMIT_RPM, OUTPUT_LIMIT_RPM);
        state.previous_output = output;

        self.terms = PidTerms {
            phase_error: active_error,
            proportional,
            integral,
            derivative,
            rpm_correction: output,
        };
        output
    }
}
