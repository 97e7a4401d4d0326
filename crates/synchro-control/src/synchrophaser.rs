//! The public synchrophaser controller.
//!
//! A [`Synchrophaser`] is one [`PidCore`] plus a [`GainStrategy`] chosen at
//! construction:
//!
//! | Strategy | Gains per tick | Feed-forward |
//! |---|---|---|
//! | [`GainStrategy::Constant`] | `ControllerConfig` gains | none |
//! | [`GainStrategy::Adaptive`] | blended by [`GainScheduler`] | none |
//! | [`GainStrategy::PhaseFrequency`] | `ControllerConfig` gains | [`FrequencyDetector`] |
//!
//! Every variant shares the same deadband, anti-windup, derivative filter,
//! rate limit and ±15 rpm clamp.
//!
//! # Example
//!
//! ```rust
//! use synchro_control::{PhaseMeasurement, Synchrophaser};
//! use synchro_types::ControllerConfig;
//!
//! let mut sync = Synchrophaser::baseline(ControllerConfig::default()).unwrap();
//! assert_eq!(sync.update(&PhaseMeasurement::angles(0.1, 0.0), 0.01), 0.0); // disabled
//!
//! sync.enable();
//! let rpm = sync.update(&PhaseMeasurement::angles(0.1, 0.0), 0.01);
//! assert!(rpm > 0.0); // main leads → speed the follower up
//! ```

use std::fmt;

use synchro_types::{
    AdaptiveConfig, ControllerConfig, ControllerVariant, FrequencyConfig, GainSet,
    SyncDiagnostics, SynchroError, phase_error,
};
use tracing::{debug, trace};

use crate::frequency::FrequencyDetector;
use crate::pid::{ControllerState, PidCore};
use crate::schedule::GainScheduler;

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

/// One tick's worth of plant readings.
///
/// Angles are accumulated blade angles in radians (any range).  Angular
/// velocities are in rad/s and only read by the phase-frequency variant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseMeasurement {
    pub blade_angle_main: f64,
    pub blade_angle_follower: f64,
    pub omega_main: f64,
    pub omega_follower: f64,
}

impl PhaseMeasurement {
    /// Angles only; both angular velocities are zero.
    pub fn angles(blade_angle_main: f64, blade_angle_follower: f64) -> Self {
        Self {
            blade_angle_main,
            blade_angle_follower,
            ..Self::default()
        }
    }

    /// Attach shaft speeds, rad/s.  The phase-frequency variant needs them.
    pub fn with_angular_velocities(mut self, omega_main: f64, omega_follower: f64) -> Self {
        self.omega_main = omega_main;
        self.omega_follower = omega_follower;
        self
    }

    /// Wrapped `main − follower` phase error.
    pub fn phase_error(&self) -> f64 {
        phase_error(self.blade_angle_main, self.blade_angle_follower)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Strategy
// ────────────────────────────────────────────────────────────────────────────

/// How a synchrophaser picks its gains and feed-forward on each tick.
#[derive(Debug, Clone)]
pub enum GainStrategy {
    Constant,
    Adaptive(GainScheduler),
    PhaseFrequency(FrequencyDetector),
}

impl GainStrategy {
    fn variant(&self) -> ControllerVariant {
        match self {
            GainStrategy::Constant => ControllerVariant::Baseline,
            GainStrategy::Adaptive(_) => ControllerVariant::Adaptive,
            GainStrategy::PhaseFrequency(_) => ControllerVariant::PhaseFrequency,
        }
    }

    fn reset(&mut self) {
        match self {
            GainStrategy::Constant => {}
            GainStrategy::Adaptive(scheduler) => scheduler.reset(),
            GainStrategy::PhaseFrequency(detector) => detector.reset(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Synchrophaser
// ────────────────────────────────────────────────────────────────────────────

/// Follower-shaft phase controller: a PID core driven by one gain strategy.
#[derive(Debug, Clone)]
pub struct Synchrophaser {
    core: PidCore,
    strategy: GainStrategy,
}

impl Synchrophaser {
    /// Constant-gain PID on phase error.
    ///
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] if `config` fails validation.
    pub fn baseline(config: ControllerConfig) -> Result<Self, SynchroError> {
        Ok(Self {
            core: PidCore::new(config)?,
            strategy: GainStrategy::Constant,
        })
    }

    /// PID with gains scheduled on |phase error|.  The blended gains start
    /// from (and reset to) the gains in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] if either record fails
    /// validation.
    pub fn adaptive(config: ControllerConfig, adaptive: AdaptiveConfig) -> Result<Self, SynchroError> {
        let base = config.gains();
        let core = PidCore::new(config)?;
        Ok(Self {
            core,
            strategy: GainStrategy::Adaptive(GainScheduler::new(adaptive, base)?),
        })
    }

    /// PID on phase plus a frequency-error feed-forward term.
    ///
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] if either record fails
    /// validation.
    pub fn phase_frequency(
        config: ControllerConfig,
        frequency: FrequencyConfig,
    ) -> Result<Self, SynchroError> {
        Ok(Self {
            core: PidCore::new(config)?,
            strategy: GainStrategy::PhaseFrequency(FrequencyDetector::new(frequency)?),
        })
    }

    /// Build whichever variant `variant` names.  Only the record that
    /// variant needs is validated.
    ///
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] on a validation failure.
    pub fn from_variant(
        variant: ControllerVariant,
        config: ControllerConfig,
        adaptive: AdaptiveConfig,
        frequency: FrequencyConfig,
    ) -> Result<Self, SynchroError> {
        match variant {
            ControllerVariant::Baseline => Self::baseline(config),
            ControllerVariant::Adaptive => Self::adaptive(config, adaptive),
            ControllerVariant::PhaseFrequency => Self::phase_frequency(config, frequency),
        }
    }

    /// Which control law this instance runs.
    pub fn variant(&self) -> ControllerVariant {
        self.strategy.variant()
    }

    /// `true` between [`enable`][Self::enable] and [`disable`][Self::disable].
    pub fn is_enabled(&self) -> bool {
        self.core.state().enabled
    }

    /// Activate the controller, starting from a clean state.
    pub fn enable(&mut self) {
        self.core.set_enabled(true);
        self.strategy.reset();
        debug!(variant = %self.variant(), "synchrophaser enabled");
    }

    /// Deactivate the controller and clear its transient state.  Calling it
    /// on a disabled controller changes nothing.
    pub fn disable(&mut self) {
        self.core.set_enabled(false);
        self.strategy.reset();
        debug!(variant = %self.variant(), "synchrophaser disabled");
    }

    /// Run one tick and return the rpm correction for the follower governor.
    ///
    /// Returns exactly 0 while disabled.  A non-finite `dt` is treated as 0.
    /// A measurement whose phase error is not finite leaves all state
    /// untouched and repeats the previous output.
    pub fn update(&mut self, measurement: &PhaseMeasurement, dt: f64) -> f64 {
        if !self.is_enabled() {
            self.core.clear_terms();
            if let GainStrategy::PhaseFrequency(detector) = &mut self.strategy {
                detector.clear_display();
            }
            return 0.0;
        }

        let raw_error = measurement.phase_error();
        if !raw_error.is_finite() {
            trace!(raw_error, "non-finite phase error, holding output");
            return self.core.state().previous_output;
        }
        let dt = if dt.is_finite() { dt } else { 0.0 };

        let (gains, feedforward_rpm) = match &mut self.strategy {
            GainStrategy::Constant => (self.core.config().gains(), 0.0),
            GainStrategy::Adaptive(scheduler) => (scheduler.advance(raw_error), 0.0),
            GainStrategy::PhaseFrequency(detector) => (
                self.core.config().gains(),
                detector.advance(measurement.omega_main, measurement.omega_follower),
            ),
        };

        let rpm = self.core.step(raw_error, gains, feedforward_rpm, dt);
        trace!(raw_error, rpm, "synchrophaser tick");
        rpm
    }

    /// Clear max/mean/count statistics.  Leaves the enabled flag and the
    /// control state alone.
    pub fn reset_stats(&mut self) {
        self.core.reset_stats();
    }

    /// Gains used on the most recent tick (the blended triple for the
    /// adaptive variant).
    pub fn active_gains(&self) -> GainSet {
        match &self.strategy {
            GainStrategy::Adaptive(scheduler) => scheduler.active_gains(),
            _ => self.core.config().gains(),
        }
    }

    /// PID tuning this controller was built with.
    pub fn config(&self) -> &ControllerConfig {
        self.core.config()
    }

    /// Integrator, previous error and running statistics.
    pub fn state(&self) -> &ControllerState {
        self.core.state()
    }

    pub fn strategy(&self) -> &GainStrategy {
        &self.strategy
    }

    /// Output of the last tick, rpm.
    pub fn rpm_correction(&self) -> f64 {
        self.core.terms().rpm_correction
    }

    /// Post-deadband phase error of the last tick, rad.
    pub fn phase_error(&self) -> f64 {
        self.core.terms().phase_error
    }

    /// Integrated phase error, rad·s.
    pub fn integrator(&self) -> f64 {
        self.core.state().integrator
    }

    /// Serialisable snapshot of the controller.
    pub fn diagnostics(&self) -> SyncDiagnostics {
        let state = self.core.state();
        let terms = self.core.terms();
        let mean = state.stats.mean_abs_error();
        SyncDiagnostics {
            variant: self.variant(),
            enabled: state.enabled,
            phase_error: terms.phase_error,
            phase_error_deg: terms.phase_error.to_degrees(),
            rpm_correction: terms.rpm_correction,
            proportional_term: terms.proportional,
            integral_term: terms.integral,
            derivative_term: terms.derivative,
            integrator: state.integrator,
            max_phase_error: state.stats.max_abs_error,
            max_phase_error_deg: state.stats.max_abs_error.to_degrees(),
            mean_abs_error: mean,
            mean_abs_error_deg: mean.to_degrees(),
            update_count: state.stats.update_count,
            frequency: match &self.strategy {
                GainStrategy::PhaseFrequency(detector) => Some(detector.diagnostics()),
                _ => None,
            },
            adaptive: match &self.strategy {
                GainStrategy::Adaptive(scheduler) => Some(scheduler.diagnostics()),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Synchrophaser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Synchrophaser[{}] {}: phase error {:+.2}°, correction {:+.2} rpm",
            self.variant(),
            if self.is_enabled() { "ON" } else { "OFF" },
            self.phase_error().to_degrees(),
            self.rpm_correction(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::OUTPUT_LIMIT_RPM;
    use crate::plant::PropellerPair;
    use crate::sim::SimPropellerPair;
    use synchro_types::GainRegime;

    const DT: f64 = 0.01;

    fn baseline() -> Synchrophaser {
        let mut s = Synchrophaser::baseline(ControllerConfig::default()).unwrap();
        s.enable();
        s
    }

    #[test]
    fn disabled_controller_returns_zero_and_clears_terms() {
        let mut s = baseline();
        s.update(&PhaseMeasurement::angles(0.3, 0.0), DT);
        assert!(s.rpm_correction() != 0.0);

        s.disable();
        assert_eq!(s.update(&PhaseMeasurement::angles(0.3, 0.0), DT), 0.0);
        let diag = s.diagnostics();
        assert!(!diag.enabled);
        assert_eq!(diag.rpm_correction, 0.0);
        assert_eq!(diag.proportional_term, 0.0);
        assert_eq!(diag.phase_error, 0.0);
    }

    #[test]
    fn disabled_tick_does_not_count() {
        let mut s = Synchrophaser::baseline(ControllerConfig::default()).unwrap();
        s.update(&PhaseMeasurement::angles(0.3, 0.0), DT);
        assert_eq!(s.diagnostics().update_count, 0);
    }

    #[test]
    fn disable_is_idempotent() {
        let mut s = baseline();
        for _ in 0..5 {
            s.update(&PhaseMeasurement::angles(0.3, 0.0), DT);
        }
        s.disable();
        let once = s.state().clone();
        s.disable();
        assert_eq!(*s.state(), once);
    }

    #[test]
    fn re_enable_starts_from_clean_state() {
        let mut s = baseline();
        for _ in 0..50 {
            s.update(&PhaseMeasurement::angles(0.4, 0.0), DT);
        }
        assert!(s.integrator() > 0.0);
        s.disable();
        s.enable();
        let state = s.state();
        assert_eq!(state.integrator, 0.0);
        assert_eq!(state.previous_error, 0.0);
        assert_eq!(state.previous_output, 0.0);
        assert_eq!(state.filtered_derivative, 0.0);
    }

    #[test]
    fn wrapped_error_drives_correction_direction() {
        let mut s = baseline();
        // 350° vs 10°: follower is 20° ahead, so slow it down.
        let rpm = s.update(
            &PhaseMeasurement::angles(350f64.to_radians(), 10f64.to_radians()),
            DT,
        );
        assert!(rpm < 0.0);
        assert!((s.phase_error() - (-20f64).to_radians()).abs() < 1e-12);
    }

    #[test]
    fn correction_always_within_limit_and_rate() {
        let mut s = baseline();
        let mut previous = 0.0;
        let mut angle = 0.0;
        for i in 0..2000_i32 {
            angle += 0.37 * f64::from(i % 7) - 1.0;
            let out = s.update(&PhaseMeasurement::angles(angle, 0.0), DT);
            assert!(out.abs() <= OUTPUT_LIMIT_RPM);
            assert!((out - previous).abs() <= 20.0 * DT + 1e-12);
            previous = out;
        }
    }

    #[test]
    fn baseline_closes_a_tenth_radian_lag() {
        let mut s = baseline();
        let mut plant = SimPropellerPair::new(2400.0).with_phase_offset(0.1);
        let deadband = s.config().deadband;

        let mut previous_error = plant.measurement().phase_error().abs();
        let mut entered_at = None;
        for tick in 0..500_u32 {
            let rpm = s.update(&plant.measurement(), DT);
            assert!(rpm.abs() <= OUTPUT_LIMIT_RPM);
            plant.apply_correction(rpm);
            plant.advance(DT);

            let error = plant.measurement().phase_error().abs();
            match entered_at {
                None => {
                    assert!(error <= previous_error + 1e-9, "tick {tick}: {error} > {previous_error}");
                    if error < deadband {
                        entered_at = Some(tick);
                    }
                }
                Some(_) => assert!(error < 0.05, "tick {tick}: drifted to {error}"),
            }
            previous_error = error;
        }
        let entered_at = entered_at.expect("deadband not reached");
        assert!(f64::from(entered_at) * DT < 5.0);
    }

    #[test]
    fn frequency_variant_reacts_to_speed_mismatch_before_phase_error() {
        let mut pfd = Synchrophaser::phase_frequency(
            ControllerConfig::default(),
            FrequencyConfig::default(),
        )
        .unwrap();
        pfd.enable();
        let mut pid = baseline();

        let m = PhaseMeasurement::angles(1.0, 1.0).with_angular_velocities(252.0, 251.0);
        let pfd_rpm = pfd.update(&m, DT);
        let pid_rpm = pid.update(&m, DT);
        assert!(pfd_rpm > 0.0);
        assert_eq!(pid_rpm, 0.0);

        let diag = pfd.diagnostics();
        let freq = diag.frequency.expect("frequency section");
        assert!((freq.freq_error - 1.0).abs() < 1e-12);
        assert!(diag.adaptive.is_none());
    }

    #[test]
    fn frequency_state_cleared_on_disable() {
        let mut pfd = Synchrophaser::phase_frequency(
            ControllerConfig::default(),
            FrequencyConfig::default(),
        )
        .unwrap();
        pfd.enable();
        let m = PhaseMeasurement::angles(0.0, 0.0).with_angular_velocities(10.0, 0.0);
        for _ in 0..10 {
            pfd.update(&m, DT);
        }
        pfd.disable();
        let freq = pfd.diagnostics().frequency.expect("frequency section");
        assert_eq!(freq.filtered_freq_error, 0.0);
        assert_eq!(freq.frequency_term, 0.0);
    }

    #[test]
    fn adaptive_blends_before_computing_the_tick() {
        let mut s =
            Synchrophaser::adaptive(ControllerConfig::default(), AdaptiveConfig::default()).unwrap();
        s.enable();
        s.update(&PhaseMeasurement::angles(0.3, 0.0), DT);
        let gains = s.active_gains();
        assert!((gains.k_p - 1.05).abs() < 1e-12);
        // P term used the blended k_p.
        assert!((s.diagnostics().proportional_term - 1.05 * 0.3).abs() < 1e-12);
        let adaptive = s.diagnostics().adaptive.expect("adaptive section");
        assert_eq!(adaptive.target_regime, GainRegime::Aggressive);
        assert_eq!(adaptive.error_window_len, 1);
    }

    #[test]
    fn adaptive_enable_restores_base_gains() {
        let mut s =
            Synchrophaser::adaptive(ControllerConfig::default(), AdaptiveConfig::default()).unwrap();
        s.enable();
        for _ in 0..30 {
            s.update(&PhaseMeasurement::angles(0.3, 0.0), DT);
        }
        s.disable();
        s.enable();
        assert_eq!(s.active_gains(), ControllerConfig::default().gains());
        assert_eq!(s.diagnostics().adaptive.map(|a| a.error_window_len), Some(0));
    }

    #[test]
    fn reset_stats_keeps_control_state() {
        let mut s = baseline();
        for _ in 0..20 {
            s.update(&PhaseMeasurement::angles(0.3, 0.0), DT);
        }
        let integrator = s.integrator();
        s.reset_stats();
        let diag = s.diagnostics();
        assert_eq!(diag.update_count, 0);
        assert_eq!(diag.max_phase_error, 0.0);
        assert_eq!(diag.mean_abs_error, 0.0);
        assert!(s.is_enabled());
        assert_eq!(s.integrator(), integrator);
    }

    #[test]
    fn non_finite_input_holds_output() {
        let mut s = baseline();
        let first = s.update(&PhaseMeasurement::angles(0.3, 0.0), DT);
        let held = s.update(&PhaseMeasurement::angles(f64::NAN, 0.0), DT);
        assert_eq!(held, first);
        assert_eq!(s.diagnostics().update_count, 1);

        let out = s.update(&PhaseMeasurement::angles(0.3, 0.0), f64::INFINITY);
        assert!(out.is_finite());
    }

    #[test]
    fn from_variant_builds_the_named_variant() {
        for variant in [
            ControllerVariant::Baseline,
            ControllerVariant::Adaptive,
            ControllerVariant::PhaseFrequency,
        ] {
            let s = Synchrophaser::from_variant(
                variant,
                ControllerConfig::default(),
                AdaptiveConfig::default(),
                FrequencyConfig::default(),
            )
            .unwrap();
            assert_eq!(s.variant(), variant);
        }
    }

    #[test]
    fn invalid_config_names_field() {
        let cfg = ControllerConfig {
            integrator_min: 1.0,
            integrator_max: -1.0,
            ..ControllerConfig::default()
        };
        match Synchrophaser::baseline(cfg) {
            Err(SynchroError::InvalidConfig { field, .. }) => assert_eq!(field, "integrator_min"),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn display_summarises_state() {
        let mut s = baseline();
        s.update(&PhaseMeasurement::angles(0.1, 0.0), DT);
        let text = s.to_string();
        assert!(text.contains("baseline"));
        assert!(text.contains("ON"));
        assert!(text.contains("rpm"));
    }

    #[test]
    fn diagnostics_serialize_to_named_map() {
        let mut s = baseline();
        s.update(&PhaseMeasurement::angles(0.2, 0.0), DT);
        let json = serde_json::to_value(s.diagnostics()).unwrap();
        assert_eq!(json["enabled"], true);
        assert_eq!(json["update_count"], 1);
        assert!(json["rpm_correction"].as_f64().unwrap() > 0.0);
    }
}
