//! `synchro-estimation` – state estimation for the synchrophaser.
//!
//! # Modules
//!
//! - [`kalman`] – [`PhaseKalmanFilter`][kalman::PhaseKalmanFilter]: two-state
//!   (phase, phase-rate) linear Kalman filter that smooths noisy phase-error
//!   measurements while respecting the `(-π, π]` wrap.

pub mod kalman;

pub use kalman::{KalmanStats, PhaseKalmanFilter};
