//! `synchro-control` – twin-propeller synchrophaser control laws.
//!
//! Holds the follower propeller at a fixed phase relative to the main one by
//! turning the wrapped blade-phase error into a small, bounded rpm correction
//! for the follower governor.
//!
//! # Modules
//!
//! - [`pid`] – [`PidCore`][pid::PidCore]: PID with deadband, anti-windup,
//!   filtered derivative, rate limit and the ±15 rpm output clamp.
//! - [`schedule`] – [`GainScheduler`][schedule::GainScheduler]: regime
//!   selection and smooth gain blending for the adaptive variant.
//! - [`frequency`] – [`FrequencyDetector`][frequency::FrequencyDetector]:
//!   filtered angular-velocity mismatch used as feed-forward.
//! - [`window`] – [`ErrorWindow`][window::ErrorWindow]: fixed-capacity FIFO
//!   of recent error magnitudes.
//! - [`synchrophaser`] – [`Synchrophaser`]: the public controller, one PID
//!   core plus a [`GainStrategy`].
//! - [`plant`] – [`PropellerPair`]: trait seam to the shafts.
//! - [`sim`] – [`SimPropellerPair`]: ideal-governor kinematic stub.

pub mod frequency;
pub mod pid;
pub mod plant;
pub mod schedule;
pub mod sim;
pub mod synchrophaser;
pub mod window;

pub use pid::OUTPUT_LIMIT_RPM;
pub use plant::PropellerPair;
pub use sim::SimPropellerPair;
pub use synchrophaser::{GainStrategy, PhaseMeasurement, Synchrophaser};
