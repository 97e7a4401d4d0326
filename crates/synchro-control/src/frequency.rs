//! Frequency-error feed-forward for the phase-frequency synchrophaser.
//!
//! A pure phase loop only reacts once a speed mismatch has already turned into
//! phase error.  [`FrequencyDetector`] looks at the angular-velocity
//! difference directly, low-pass filters it and turns it into an rpm
//! feed-forward term, so the follower starts correcting on the first tick of
//! a mismatch.

use synchro_types::{FrequencyConfig, FrequencyDiagnostics, SynchroError, rad_s_to_rpm};

/// Low-pass filtered shaft-speed mismatch, scaled to an rpm feed-forward.
#[derive(Debug, Clone)]
pub struct FrequencyDetector {
    config: FrequencyConfig,
    freq_error: f64,
    filtered_freq_error: f64,
    frequency_term: f64,
}

impl FrequencyDetector {
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: FrequencyConfig) -> Result<Self, SynchroError> {
        config.validate()?;
        Ok(Self {
            config,
            freq_error: 0.0,
            filtered_freq_error: 0.0,
            frequency_term: 0.0,
        })
    }

    /// Fold in one pair of angular velocities (rad/s) and return the
    /// feed-forward correction in rpm.
    ///
    /// A non-finite mismatch is recorded as zero so it cannot poison the
    /// filter.
    pub fn advance(&mut self, omega_main: f64, omega_follower: f64) -> f64 {
        let mismatch = omega_main - omega_follower;
        self.freq_error = if mismatch.is_finite() { mismatch } else { 0.0 };

        let alpha = self.config.filter_alpha;
        self.filtered_freq_error = alpha * self.freq_error + (1.0 - alpha) * self.filtered_freq_error;
        self.frequency_term = self.config.k_f * self.filtered_freq_error;
        rad_s_to_rpm(self.frequency_term)
    }

    /// Zero the per-tick values shown in diagnostics, keeping the filter.
    pub fn clear_display(&mut self) {
        self.freq_error = 0.0;
        self.frequency_term = 0.0;
    }

    /// Zero everything, filter included.
    pub fn reset(&mut self) {
        self.freq_error = 0.0;
        self.filtered_freq_error = 0.0;
        self.frequency_term = 0.0;
    }

    /// Filtered ω_main − ω_follower, rad/s.
    pub fn filtered_freq_error(&self) -> f64 {
        self.filtered_freq_error
    }

    /// Feed-forward of the last tick, rpm.
    pub fn frequency_term(&self) -> f64 {
        self.frequency_term
    }

    pub fn diagnostics(&self) -> FrequencyDiagnostics {
        FrequencyDiagnostics {
            freq_error: self.freq_error,
            freq_error_rpm: rad_s_to_rpm(self.freq_error),
            filtered_freq_error: self.filtered_freq_error,
            frequency_term: self.frequency_term,
        }
    }
}
