//! `synchro-runtime` – everything needed to run a synchrophaser outside a
//! unit test.
//!
//! # Modules
//!
//! - [`config`] – [`SynchroConfig`][config::SynchroConfig]: TOML file loading
//!   with `SYNCHRO_*` environment overrides, and construction of validated
//!   controllers and filters from it.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber.
//! - [`sync_loop`] – [`SyncLoop`][sync_loop::SyncLoop]: closed-loop tick
//!   driver over any [`PropellerPair`][synchro_control::PropellerPair].
//! - [`trial`] – [`SyncTrial`][trial::SyncTrial]: OFF/ON effectiveness trial
//!   and its [`TrialResults`][trial::TrialResults] report.

pub mod config;
pub mod sync_loop;
pub mod telemetry;
pub mod trial;

pub use config::SynchroConfig;
pub use sync_loop::{SyncLoop, TickRecord};
pub use trial::{SyncTrial, TrialPhase, TrialResults, Verdict};
