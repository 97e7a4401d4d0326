//! Read-only controller snapshots.
//!
//! A [`SyncDiagnostics`] is produced on demand by the synchrophaser; it owns
//! copies of the values, so holding one never borrows the controller.
//! Serialising it (e.g. with `serde_json`) yields the named mapping consumed by
//! loggers and dashboards.

use serde::Serialize;

use crate::config::{ControllerVariant, GainRegime, GainSet};

/// Snapshot common to every controller variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncDiagnostics {
    pub variant: ControllerVariant,
    pub enabled: bool,
    /// Active (post-deadband) phase error of the last tick, rad.
    pub phase_error: f64,
    pub phase_error_deg: f64,
    pub rpm_correction: f64,
    pub proportional_term: f64,
    pub integral_term: f64,
    pub derivative_term: f64,
    pub integrator: f64,
    /// Largest |raw phase error| seen since the last stats reset, rad.
    pub max_phase_error: f64,
    pub max_phase_error_deg: f64,
    /// Mean |raw phase error| since the last stats reset, rad.
    pub mean_abs_error: f64,
    pub mean_abs_error_deg: f64,
    pub update_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<FrequencyDiagnostics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adaptive: Option<AdaptiveDiagnostics>,
}

/// Extra fields of the phase-frequency variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyDiagnostics {
    /// Unfiltered `ω_main − ω_follower`, rad/s.
    pub freq_error: f64,
    pub freq_error_rpm: f64,
    pub filtered_freq_error: f64,
    /// `k_f · filtered_freq_error`, rad/s.
    pub frequency_term: f64,
}

/// Extra fields of the adaptive variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptiveDiagnostics {
    /// The blended gains used on the last tick.
    pub active_gains: GainSet,
    pub target_regime: GainRegime,
    /// Rolling mean of |raw phase error| over the error window, rad.
    pub recent_mean_error: f64,
    pub recent_mean_error_deg: f64,
    pub error_window_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SyncDiagnostics {
        SyncDiagnostics {
            variant: ControllerVariant::Baseline,
            enabled: true,
            phase_error: 0.1,
            phase_error_deg: 0.1f64.to_degrees(),
            rpm_correction: 1.5,
            proportional_term: 0.1,
            integral_term: 0.0,
            derivative_term: 0.0,
            integrator: 0.0,
            max_phase_error: 0.1,
            max_phase_error_deg: 0.1f64.to_degrees(),
            mean_abs_error: 0.1,
            mean_abs_error_deg: 0.1f64.to_degrees(),
            update_count: 1,
            frequency: None,
            adaptive: None,
        }
    }

    #[test]
    fn baseline_snapshot_omits_variant_sections() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["variant"], "baseline");
        assert_eq!(json["update_count"], 1);
        assert!(json.get("frequency").is_none());
        assert!(json.get("adaptive").is_none());
    }

    #[test]
    fn variant_sections_serialize_as_nested_maps() {
        let mut diag = sample();
        diag.variant = ControllerVariant::Adaptive;
        diag.adaptive = Some(AdaptiveDiagnostics {
            active_gains: GainSet::new(1.2, 0.12, 0.6),
            target_regime: GainRegime::Conservative,
            recent_mean_error: 0.01,
            recent_mean_error_deg: 0.01f64.to_degrees(),
            error_window_len: 3,
        });
        let json = serde_json::to_value(diag).unwrap();
        assert_eq!(json["variant"], "adaptive");
        assert_eq!(json["adaptive"]["target_regime"], "conservative");
        assert_eq!(json["adaptive"]["active_gains"]["k_p"], 1.2);
    }
}
