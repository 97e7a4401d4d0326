//! Configuration file – reads/writes `synchrophaser.toml`.
//!
//! Every table is optional; missing keys fall back to their defaults, so a
//! file containing only
//!
//! ```toml
//! mode = "adaptive"
//!
//! [controller]
//! deadband = 0.02
//! ```
//!
//! is a complete configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use synchro_control::Synchrophaser;
use synchro_estimation::PhaseKalmanFilter;
use synchro_types::{
    AdaptiveConfig, ControllerConfig, ControllerVariant, FrequencyConfig, KalmanConfig,
    SynchroError,
};
use tracing::warn;

/// File name used when `SYNCHRO_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "synchrophaser.toml";

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynchroConfig {
    /// Which control law to run.
    pub mode: ControllerVariant,
    /// Control tick period, seconds.
    pub dt: f64,
    pub controller: ControllerConfig,
    pub adaptive: AdaptiveConfig,
    pub frequency: FrequencyConfig,
    /// Present only when the phase error should also be Kalman-filtered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kalman: Option<KalmanConfig>,
}

impl Default for SynchroConfig {
    fn default() -> Self {
        Self {
            mode: ControllerVariant::default(),
            dt: 0.01,
            controller: ControllerConfig::default(),
            adaptive: AdaptiveConfig::default(),
            frequency: FrequencyConfig::default(),
            kalman: None,
        }
    }
}

impl SynchroConfig {
    /// Validate the tick period and every record the selected mode uses.
    ///
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), SynchroError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(SynchroError::invalid_config(
                "dt",
                format!("must be a finite value > 0 (got {})", self.dt),
            ));
        }
        self.controller.validate()?;
        match self.mode {
            ControllerVariant::Baseline => {}
            ControllerVariant::Adaptive => self.adaptive.validate()?,
            ControllerVariant::PhaseFrequency => self.frequency.validate()?,
        }
        if let Some(kalman) = &self.kalman {
            kalman.validate()?;
        }
        Ok(())
    }

    /// Build the synchrophaser selected by `mode`.  It starts disabled.
    ///
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] if the records fail validation.
    pub fn build_synchrophaser(&self) -> Result<Synchrophaser, SynchroError> {
        Synchrophaser::from_variant(
            self.mode,
            self.controller.clone(),
            self.adaptive.clone(),
            self.frequency.clone(),
        )
    }

    /// Build the phase filter, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`SynchroError::InvalidConfig`] if the `[kalman]` table fails
    /// validation.
    pub fn build_kalman(&self) -> Result<Option<PhaseKalmanFilter>, SynchroError> {
        self.kalman.clone().map(PhaseKalmanFilter::new).transpose()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Paths
// ────────────────────────────────────────────────────────────────────────────

/// `$SYNCHRO_CONFIG`, or [`DEFAULT_CONFIG_FILE`] in the working directory.
pub fn config_path() -> PathBuf {
    config_path_from(std::env::var("SYNCHRO_CONFIG").ok())
}

/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_from(configured: Option<String>) -> PathBuf {
    match configured {
        Some(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Load / save
// ────────────────────────────────────────────────────────────────────────────

/// Load the config from [`config_path`].  Returns `None` if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`SynchroError::ConfigFile`] if the file cannot be read or parsed.
pub fn load() -> Result<Option<SynchroConfig>, SynchroError> {
    load_from(&config_path())
}

/// Load the config from a specific path and apply environment overrides.
///
/// # Errors
///
/// Returns [`SynchroError::ConfigFile`] if the file cannot be read or parsed.
pub fn load_from(path: &Path) -> Result<Option<SynchroConfig>, SynchroError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        SynchroError::ConfigFile(format!("failed to read {}: {e}", path.display()))
    })?;
    let mut cfg: SynchroConfig = toml::from_str(&raw).map_err(|e| {
        SynchroError::ConfigFile(format!("failed to parse {}: {e}", path.display()))
    })?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `SYNCHRO_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SYNCHRO_MODE` | `mode` (`baseline`/`pid`, `adaptive`, `phase_frequency`/`pfd`) |
/// | `SYNCHRO_DT` | `dt` |
/// | `SYNCHRO_DEADBAND` | `controller.deadband` |
/// | `SYNCHRO_RATE_LIMIT` | `controller.rate_limit` |
///
/// Values that do not parse are ignored with a warning.
pub fn apply_env_overrides(cfg: &mut SynchroConfig) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

/// [`apply_env_overrides`] over an arbitrary key lookup.
pub(crate) fn apply_overrides(cfg: &mut SynchroConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("SYNCHRO_MODE") {
        match v.parse::<ControllerVariant>() {
            Ok(mode) => cfg.mode = mode,
            Err(e) => warn!(value = %v, error = %e, "ignoring SYNCHRO_MODE"),
        }
    }
    if let Some(dt) = parse_f64(&lookup, "SYNCHRO_DT") {
        cfg.dt = dt;
    }
    if let Some(deadband) = parse_f64(&lookup, "SYNCHRO_DEADBAND") {
        cfg.controller.deadband = deadband;
    }
    if let Some(rate_limit) = parse_f64(&lookup, "SYNCHRO_RATE_LIMIT") {
        cfg.controller.rate_limit = rate_limit;
    }
}

fn parse_f64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<f64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable override");
            None
        }
    }
}

/// Save the config to [`config_path`].
///
/// # Errors
///
/// Returns [`SynchroError::ConfigFile`] on a serialisation or IO failure.
pub fn save(cfg: &SynchroConfig) -> Result<(), SynchroError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path, creating parent directories.
///
/// # Errors
///
/// Returns [`SynchroError::ConfigFile`] on a serialisation or IO failure.
pub fn save_to(cfg: &SynchroConfig, path: &Path) -> Result<(), SynchroError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            SynchroError::ConfigFile(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| SynchroError::ConfigFile(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        SynchroError::ConfigFile(format!("failed to write {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_from(&dir.path().join("absent.toml")).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("nested").join(DEFAULT_CONFIG_FILE);

        let cfg = SynchroConfig {
            kalman: Some(KalmanConfig::default()),
            ..SynchroConfig::default()
        };
        save_to(&cfg, &path).expect("save");

        let raw = std::fs::read_to_string(&path).expect("read back");
        let loaded: SynchroConfig = toml::from_str(&raw).expect("parse");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            "mode = \"phase_frequency\"\n\n[controller]\ndeadband = 0.02\n\n[frequency]\nk_f = 0.8\n",
        )
        .expect("write");

        // Parsed directly so the process environment cannot interfere.
        let raw = std::fs::read_to_string(&path).expect("read");
        let cfg: SynchroConfig = toml::from_str(&raw).expect("parse");
        assert_eq!(cfg.mode, ControllerVariant::PhaseFrequency);
        assert_eq!(cfg.controller.deadband, 0.02);
        assert_eq!(cfg.controller.k_p, 1.0);
        assert_eq!(cfg.frequency.k_f, 0.8);
        assert_eq!(cfg.dt, 0.01);
        assert!(cfg.kalman.is_none());
    }

    #[test]
    fn malformed_file_is_a_config_file_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "dt = \"fast\"").expect("write");
        match load_from(&path) {
            Err(SynchroError::ConfigFile(msg)) => assert!(msg.contains("parse")),
            other => panic!("expected ConfigFile error, got {other:?}"),
        }
    }

    #[test]
    fn overrides_replace_fields() {
        let mut cfg = SynchroConfig::default();
        apply_overrides(
            &mut cfg,
            lookup_from(&[
                ("SYNCHRO_MODE", "adaptive"),
                ("SYNCHRO_DT", "0.02"),
                ("SYNCHRO_DEADBAND", "0.005"),
                ("SYNCHRO_RATE_LIMIT", "40"),
            ]),
        );
        assert_eq!(cfg.mode, ControllerVariant::Adaptive);
        assert_eq!(cfg.dt, 0.02);
        assert_eq!(cfg.controller.deadband, 0.005);
        assert_eq!(cfg.controller.rate_limit, 40.0);
    }

    #[test]
    fn overrides_accept_mode_aliases() {
        let mut cfg = SynchroConfig::default();
        apply_overrides(&mut cfg, lookup_from(&[("SYNCHRO_MODE", "PFD")]));
        assert_eq!(cfg.mode, ControllerVariant::PhaseFrequency);
    }

    #[test]
    fn overrides_ignore_unparsable_values() {
        let mut cfg = SynchroConfig::default();
        apply_overrides(
            &mut cfg,
            lookup_from(&[("SYNCHRO_MODE", "turbo"), ("SYNCHRO_DT", "soon")]),
        );
        assert_eq!(cfg, SynchroConfig::default());
    }

    #[test]
    fn config_path_prefers_explicit_value() {
        assert_eq!(
            config_path_from(Some("/etc/synchro.toml".to_string())),
            PathBuf::from("/etc/synchro.toml")
        );
        assert_eq!(config_path_from(None), PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(config_path_from(Some("  ".to_string())), PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn validate_rejects_non_positive_dt() {
        let cfg = SynchroConfig {
            dt: 0.0,
            ..SynchroConfig::default()
        };
        match cfg.validate() {
            Err(SynchroError::InvalidConfig { field, .. }) => assert_eq!(field, "dt"),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn validate_checks_only_the_active_variant_record() {
        let mut cfg = SynchroConfig::default();
        cfg.adaptive.gain_transition_rate = 5.0;
        assert!(cfg.validate().is_ok());
        cfg.mode = ControllerVariant::Adaptive;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn builds_controller_and_optional_filter() {
        let mut cfg = SynchroConfig {
            mode: ControllerVariant::Adaptive,
            ..SynchroConfig::default()
        };
        let sync = cfg.build_synchrophaser().expect("valid");
        assert_eq!(sync.variant(), ControllerVariant::Adaptive);
        assert!(!sync.is_enabled());
        assert!(cfg.build_kalman().expect("valid").is_none());

        cfg.kalman = Some(KalmanConfig {
            measurement_noise: -1.0,
            ..KalmanConfig::default()
        });
        assert!(cfg.build_kalman().is_err());
    }
}
