//! `synchro-types` – shared vocabulary of the synchrophaser workspace.
//!
//! Everything here is plain data: no control law lives in this crate, so the
//! controller, estimator and runtime crates can all depend on it without
//! depending on each other.
//!
//! # Modules
//!
//! - [`phase`] – [`wrap_phase`][phase::wrap_phase] and
//!   [`phase_error`][phase::phase_error] (the single wrap convention used
//!   everywhere), plus rpm ↔ rad/s conversions.
//! - [`config`] – immutable, validated configuration records:
//!   [`ControllerConfig`], [`AdaptiveConfig`], [`FrequencyConfig`],
//!   [`KalmanConfig`], and the [`GainSet`] triple.
//! - [`diagnostics`] – read-only snapshots returned by the controllers
//!   ([`SyncDiagnostics`] and its variant extensions).
//! - [`error`] – [`SynchroError`], the workspace-wide error type.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod phase;

pub use config::{
    AdaptiveConfig, ControllerConfig, ControllerVariant, FrequencyConfig, GainRegime, GainSet,
    KalmanConfig,
};
pub use diagnostics::{AdaptiveDiagnostics, FrequencyDiagnostics, SyncDiagnostics};
pub use error::SynchroError;
pub use phase::{phase_error, rad_s_to_rpm, rpm_to_rad_s, wrap_phase};
