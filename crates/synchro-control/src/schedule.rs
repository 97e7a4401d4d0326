//! Error-scheduled gain blending for the adaptive synchrophaser.
//!
//! On every tick the scheduler classifies the current |phase error| into a
//! [`GainRegime`] and moves the active gains a fixed fraction of the way
//! toward that regime's gain set.  The blend is a first-order lag, so a
//! regime switch never produces a gain step and the gains never overshoot
//! their target.

use synchro_types::{AdaptiveConfig, AdaptiveDiagnostics, GainRegime, GainSet, SynchroError};
use tracing::debug;

use crate::window::ErrorWindow;

/// Blends the active PID gains toward the set chosen by recent phase error.
#[derive(Debug, Clone)]
pub struct GainScheduler {
    config: AdaptiveConfig,
    /// Gains restored on reset.
    base: GainSet,
    active: GainSet,
    target_regime: GainRegime,
    window: ErrorWindow,
}

impl GainScheduler {
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: AdaptiveConfig, base: GainSet) -> Result<Self, SynchroError> {
        config.validate()?;
        let window = ErrorWindow::new(config.error_window_capacity);
        Ok(Self {
            config,
            base,
            active: base,
            target_regime: GainRegime::Moderate,
            window,
        })
    }

    /// Record `raw_error`, retarget, blend, and return the gains to use for
    /// this tick.
    pub fn advance(&mut self, raw_error: f64) -> GainSet {
        let magnitude = raw_error.abs();
        self.window.push(magnitude);

        let regime = self.config.regime_for(magnitude);
        if regime != self.target_regime {
            debug!(from = %self.target_regime, to = %regime, error = magnitude, "gain regime change");
            self.target_regime = regime;
        }

        let target = self.config.gains_for(regime);
        self.active
            .blend_toward(&target, self.config.gain_transition_rate);
        self.active
    }

    /// Clear the error window and restore the base gains.
    pub fn reset(&mut self) {
        self.window.clear();
        self.active = self.base;
        self.target_regime = GainRegime::Moderate;
    }

    /// Gains used on the last tick.
    pub fn active_gains(&self) -> GainSet {
        self.active
    }

    /// Regime the gains are currently blending toward.
    pub fn target_regime(&self) -> GainRegime {
        self.target_regime
    }

    /// Mean |phase error| over the window, rad.
    pub fn recent_mean_error(&self) -> f64 {
        self.window.mean()
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> AdaptiveDiagnostics {
        let recent = self.window.mean();
        AdaptiveDiagnostics {
            active_gains: self.active,
            target_regime: self.target_regime,
            recent_mean_error: recent,
            recent_mean_error_deg: recent.to_degrees(),
            error_window_len: self.window.len(),
        }
    }
}
