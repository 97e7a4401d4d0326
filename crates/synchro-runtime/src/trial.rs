//! OFF/ON effectiveness trial.
//!
//! A trial runs the plant for one period with the synchrophaser off, then one
//! period with it on, collecting |rpm difference| and |phase error| on every
//! tick.  Comparing the two periods says whether the controller actually
//! helps on this plant.
//!
//! ```text
//!  Idle ──start()──▶ Off ──duration elapsed──▶ On ──duration elapsed──▶ Complete
//! ```
//!
//! [`SyncTrial`] is a passive state machine: the caller feeds it samples and
//! obeys the returned enable flag.  [`run_trial`] does both against a
//! [`SyncLoop`].

use std::fmt;

use serde::Serialize;
use synchro_control::PropellerPair;
use tracing::info;

use crate::sync_loop::SyncLoop;

/// Improvement above which a trial counts as [`Verdict::Effective`], percent.
pub const EFFECTIVE_THRESHOLD_PCT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialPhase {
    Idle,
    Off,
    On,
    Complete,
}

impl fmt::Display for TrialPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrialPhase::Idle => write!(f, "idle"),
            TrialPhase::Off => write!(f, "synchro OFF"),
            TrialPhase::On => write!(f, "synchro ON"),
            TrialPhase::Complete => write!(f, "complete"),
        }
    }
}

/// Judgement on the mean rpm-error improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// More than [`EFFECTIVE_THRESHOLD_PCT`] improvement.
    Effective,
    /// Some improvement.
    Marginal,
    /// No improvement, or worse.
    Ineffective,
}

impl Verdict {
    pub fn from_improvement(pct: f64) -> Self {
        if pct > EFFECTIVE_THRESHOLD_PCT {
            Verdict::Effective
        } else if pct > 0.0 {
            Verdict::Marginal
        } else {
            Verdict::Ineffective
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Effective => write!(f, "EFFECTIVE (>20% improvement)"),
            Verdict::Marginal => write!(f, "MARGINAL (0-20% improvement)"),
            Verdict::Ineffective => write!(f, "NOT EFFECTIVE (no improvement)"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Results
// ────────────────────────────────────────────────────────────────────────────

/// Statistics of one trial period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PeriodMetrics {
    pub mean_rpm_error: f64,
    pub max_rpm_error: f64,
    /// Population standard deviation.
    pub std_rpm_error: f64,
    pub mean_phase_error_deg: f64,
    pub max_phase_error_deg: f64,
    pub samples: usize,
}

impl PeriodMetrics {
    fn from_samples(rpm_errors: &[f64], phase_errors: &[f64]) -> Self {
        Self {
            mean_rpm_error: mean(rpm_errors),
            max_rpm_error: max(rpm_errors),
            std_rpm_error: std_dev(rpm_errors),
            mean_phase_error_deg: mean(phase_errors).to_degrees(),
            max_phase_error_deg: max(phase_errors).to_degrees(),
            samples: rpm_errors.len(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// `(off − on) / off · 100`, or 0 when the OFF mean is not positive.
fn improvement_pct(off: f64, on: f64) -> f64 {
    if off > 0.0 { (off - on) / off * 100.0 } else { 0.0 }
}

/// Outcome of a completed trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResults {
    pub off: PeriodMetrics,
    pub on: PeriodMetrics,
    /// Reduction of the mean rpm error, percent.
    pub rpm_error_improvement_pct: f64,
    /// Reduction of the mean phase error, percent.
    pub phase_error_improvement_pct: f64,
}

impl TrialResults {
    pub fn verdict(&self) -> Verdict {
        Verdict::from_improvement(self.rpm_error_improvement_pct)
    }
}

impl fmt::Display for TrialResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (off, on) = (&self.off, &self.on);
        writeln!(f, "SYNCHROPHASER TRIAL RESULTS")?;
        writeln!(f)?;
        writeln!(f, "RPM error (main vs follower):")?;
        writeln!(
            f,
            "  OFF: mean={:.2} rpm, max={:.2} rpm, std={:.2}",
            off.mean_rpm_error, off.max_rpm_error, off.std_rpm_error
        )?;
        writeln!(
            f,
            "  ON:  mean={:.2} rpm, max={:.2} rpm, std={:.2}",
            on.mean_rpm_error, on.max_rpm_error, on.std_rpm_error
        )?;
        writeln!(f, "  improvement: {:.1}%", self.rpm_error_improvement_pct)?;
        writeln!(f)?;
        writeln!(f, "Phase error:")?;
        writeln!(
            f,
            "  OFF: mean={:.2}°, max={:.2}°",
            off.mean_phase_error_deg, off.max_phase_error_deg
        )?;
        writeln!(
            f,
            "  ON:  mean={:.2}°, max={:.2}°",
            on.mean_phase_error_deg, on.max_phase_error_deg
        )?;
        writeln!(f, "  improvement: {:.1}%", self.phase_error_improvement_pct)?;
        writeln!(f)?;
        write!(f, "STATUS: {}", self.verdict())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SyncTrial
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SyncTrial {
    phase: TrialPhase,
    phase_start: f64,
    off_rpm_errors: Vec<f64>,
    off_phase_errors: Vec<f64>,
    on_rpm_errors: Vec<f64>,
    on_phase_errors: Vec<f64>,
    results: Option<TrialResults>,
}

impl Default for SyncTrial {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTrial {
    pub fn new() -> Self {
        Self {
            phase: TrialPhase::Idle,
            phase_start: 0.0,
            off_rpm_errors: Vec::new(),
            off_phase_errors: Vec::new(),
            on_rpm_errors: Vec::new(),
            on_phase_errors: Vec::new(),
            results: None,
        }
    }

    /// Begin a new trial at time `now`, discarding any previous samples and
    /// results.
    pub fn start(&mut self, now: f64) {
        self.phase = TrialPhase::Off;
        self.phase_start = now;
        self.off_rpm_errors.clear();
        self.off_phase_errors.clear();
        self.on_rpm_errors.clear();
        self.on_phase_errors.clear();
        self.results = None;
        info!(time = now, "synchrophaser trial started");
    }

    /// Record one sample and advance the state machine.
    ///
    /// Returns whether the synchrophaser should be enabled for the next tick,
    /// and the phase the trial is now in.  Each period lasts
    /// `phase_duration` seconds.
    pub fn update(
        &mut self,
        now: f64,
        rpm_main: f64,
        rpm_follower: f64,
        phase_error: f64,
        phase_duration: f64,
    ) -> (bool, TrialPhase) {
        let elapsed = now - self.phase_start;
        let rpm_error = (rpm_main - rpm_follower).abs();
        let phase_error = phase_error.abs();

        match self.phase {
            TrialPhase::Idle | TrialPhase::Complete => (false, self.phase),
            TrialPhase::Off => {
                self.off_rpm_errors.push(rpm_error);
                self.off_phase_errors.push(phase_error);
                if elapsed >= phase_duration {
                    self.phase = TrialPhase::On;
                    self.phase_start = now;
                    info!(time = now, "trial OFF period complete, enabling synchrophaser");
                    (true, self.phase)
                } else {
                    (false, self.phase)
                }
            }
            TrialPhase::On => {
                self.on_rpm_errors.push(rpm_error);
                self.on_phase_errors.push(phase_error);
                if elapsed >= phase_duration {
                    let results = self.compute_results();
                    info!(
                        rpm_improvement_pct = results.rpm_error_improvement_pct,
                        phase_improvement_pct = results.phase_error_improvement_pct,
                        verdict = %results.verdict(),
                        "synchrophaser trial complete"
                    );
                    self.results = Some(results);
                    self.phase = TrialPhase::Complete;
                }
                (true, self.phase)
            }
        }
    }

    fn compute_results(&self) -> TrialResults {
        let off = PeriodMetrics::from_samples(&self.off_rpm_errors, &self.off_phase_errors);
        let on = PeriodMetrics::from_samples(&self.on_rpm_errors, &self.on_phase_errors);
        TrialResults {
            rpm_error_improvement_pct: improvement_pct(off.mean_rpm_error, on.mean_rpm_error),
            phase_error_improvement_pct: improvement_pct(
                off.mean_phase_error_deg,
                on.mean_phase_error_deg,
            ),
            off,
            on,
        }
    }

    /// Current stage of the trial.
    pub fn phase(&self) -> TrialPhase {
        self.phase
    }

    /// `true` during the OFF and ON periods.
    pub fn is_running(&self) -> bool {
        matches!(self.phase, TrialPhase::Off | TrialPhase::On)
    }

    /// Available once the trial is complete.
    pub fn results(&self) -> Option<&TrialResults> {
        self.results.as_ref()
    }
}

/// Drive `sync_loop` through a full OFF/ON trial of `phase_duration` seconds
/// per period.  The controller is disabled for the OFF period and left
/// enabled afterwards.
///
/// Returns `None` if `phase_duration` or `dt` is not a positive finite number.
pub fn run_trial<P: PropellerPair>(
    sync_loop: &mut SyncLoop<P>,
    phase_duration: f64,
    dt: f64,
) -> Option<TrialResults> {
    if !dt.is_finite() || dt <= 0.0 || !phase_duration.is_finite() || phase_duration <= 0.0 {
        return None;
    }

    let mut trial = SyncTrial::new();
    trial.start(sync_loop.time());
    sync_loop.controller_mut().disable();

    let ticks_per_period = (phase_duration / dt).ceil() as usize + 2;
    for _ in 0..2 * ticks_per_period {
        let record = sync_loop.step(dt);
        let (enable, phase) = trial.update(
            record.time,
            record.rpm_main,
            record.rpm_follower,
            record.phase_error,
            phase_duration,
        );
        let controller = sync_loop.controller_mut();
        if enable && !controller.is_enabled() {
            controller.enable();
        } else if !enable && controller.is_enabled() {
            controller.disable();
        }
        if phase == TrialPhase::Complete {
            break;
        }
    }
    trial.results().cloned()
}
