//! Emitter confirmation — "is the infrared emitter actually firing?"
//!
//! Two interchangeable strategies answer that question after a candidate
//! control is applied: ask the operator ([`ManualProbe`]) or compare
//! frame-variance samples taken before and after the control with a Welch
//! t-test ([`AutoProbe`]). The search engine only sees the
//! [`EmitterProbe`] capability and is agnostic to which one is active.
//!
//! The probe receives the candidate application as a closure so the
//! automatic strategy can sample *before* the control is written.

use std::fmt;
use std::io::{BufRead, Write};
use std::time::Duration;

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::capture::{CaptureError, FrameSource};
use crate::uvc::{self, UvcError};

// ── Error type ──

/// Probe errors. A probe that cannot reach the camera aborts the run; it
/// never converts that into a "not working" answer.
#[derive(Debug)]
pub enum ProbeError {
    Unavailable(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Unavailable(e) => write!(f, "Camera unavailable: {e}"),
        }
    }
}

impl std::error::Error for ProbeError {}

impl From<CaptureError> for ProbeError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::Unavailable(msg) => ProbeError::Unavailable(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;

// ── Trait ──

/// One confirmation attempt.
///
/// `apply` writes the candidate control; the probe decides when to invoke
/// it relative to its own sampling. An expected application failure is a
/// negative answer (the candidate cannot have fired), a vanished device is
/// fatal.
pub trait EmitterProbe {
    fn probe(&mut self, apply: &mut dyn FnMut() -> uvc::Result<()>) -> Result<bool>;
}

/// Run `apply`, folding the expected failure class into `false`.
fn applied(apply: &mut dyn FnMut() -> uvc::Result<()>) -> Result<bool> {
    match apply() {
        Ok(()) => Ok(true),
        Err(UvcError::Failed(e)) => {
            log::debug!("candidate could not be applied: {e}");
            Ok(false)
        }
        Err(UvcError::Unavailable(e)) => Err(ProbeError::Unavailable(e)),
    }
}

// ── Interactive prompt ──

/// The question asked after each candidate in manual mode.
pub const EMITTER_PROMPT: &str =
    "Did you see the ir emitter flashing (not just turn on) ? Yes/No ? ";

/// Blocking yes/no prompt loop.
///
/// Accepts {yes, y, no, n} case-insensitively, re-prompting on anything
/// else. End of input counts as "no" so a closed stdin cannot spin forever.
pub fn ask_yes_no(prompt: &str, input: &mut impl BufRead, output: &mut impl Write) -> bool {
    let mut question = prompt;
    loop {
        let _ = write!(output, "{question}");
        let _ = output.flush();
        let mut line = String::new();
        if input.read_line(&mut line).unwrap_or(0) == 0 {
            return false;
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" => return true,
            "no" | "n" => return false,
            _ => question = "Yes/No ? ",
        }
    }
}

// ── Manual strategy ──

/// Default time the candidate control is held engaged before asking.
pub const DEFAULT_DWELL: Duration = Duration::from_millis(2000);

/// Apply the candidate, prove the stream is live, hold for the dwell time,
/// then ask the operator. Blocks without bound on the answer.
pub struct ManualProbe<S> {
    source: S,
    dwell: Duration,
}

impl<S: FrameSource> ManualProbe<S> {
    pub fn new(source: S, dwell: Duration) -> Self {
        Self { source, dwell }
    }
}

impl<S: FrameSource> EmitterProbe for ManualProbe<S> {
    fn probe(&mut self, apply: &mut dyn FnMut() -> uvc::Result<()>) -> Result<bool> {
        if !applied(apply)? {
            return Ok(false);
        }
        // One live frame proves the stream decodes; the frame is discarded.
        self.source.sample_variances(1)?;
        std::thread::sleep(self.dwell);

        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        Ok(ask_yes_no(EMITTER_PROMPT, &mut input, &mut output))
    }
}

// ── Automatic strategy ──

/// Default number of frames per variance sample.
pub const DEFAULT_SAMPLE_SIZE: usize = 30;

/// One-sided significance threshold for the variance-shift test.
const SIGNIFICANCE: f64 = 0.01;

/// Sample frame variances before and after the candidate and accept when
/// the "after" population shifted up with one-sided p < 0.01.
pub struct AutoProbe<S> {
    source: S,
    sample_size: usize,
    last_mean_variance: Option<f64>,
    verbose: bool,
}

impl<S: FrameSource> AutoProbe<S> {
    pub fn new(source: S, sample_size: usize) -> Self {
        Self {
            source,
            sample_size,
            last_mean_variance: None,
            verbose: false,
        }
    }

    /// Emit per-candidate p-values at debug level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Mean variance of the most recent "after" sample.
    ///
    /// A scoring hook for ranking confirmed candidates by signal strength;
    /// the stop-at-first-success engine does not consult it.
    pub fn last_mean_variance(&self) -> Option<f64> {
        self.last_mean_variance
    }
}

impl<S: FrameSource> EmitterProbe for AutoProbe<S> {
    fn probe(&mut self, apply: &mut dyn FnMut() -> uvc::Result<()>) -> Result<bool> {
        let before = self.source.sample_variances(self.sample_size)?;
        if !applied(apply)? {
            return Ok(false);
        }
        let after = self.source.sample_variances(self.sample_size)?;
        self.last_mean_variance = Some(mean(&after));

        match variance_shift_p_value(&before, &after) {
            Some(p) => {
                if self.verbose {
                    log::debug!("variance shift p-value: {p:.4}");
                }
                Ok(p < SIGNIFICANCE)
            }
            // Degenerate samples (too short, or zero spread) carry no evidence.
            None => Ok(false),
        }
    }
}

// ── Welch t-test ──

/// One-sided p-value that `after` is drawn from a higher-mean population
/// than `before` (Welch's unequal-variance t-test).
///
/// Returns `None` when either sample is too small or both have zero spread.
pub fn variance_shift_p_value(before: &[f64], after: &[f64]) -> Option<f64> {
    let n1 = before.len() as f64;
    let n2 = after.len() as f64;
    if n1 < 2.0 || n2 < 2.0 {
        return None;
    }
    let m1 = mean(before);
    let m2 = mean(after);
    let v1 = sample_variance(before, m1);
    let v2 = sample_variance(after, m2);

    let se_sq = v1 / n1 + v2 / n2;
    if se_sq <= 0.0 {
        return None;
    }
    let t = (m2 - m1) / se_sq.sqrt();

    // Welch–Satterthwaite degrees of freedom.
    let df = se_sq * se_sq
        / ((v1 / n1).powi(2) / (n1 - 1.0) + (v2 / n2).powi(2) / (n2 - 1.0));

    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some(1.0 - dist.cdf(t))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_variance(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    sum_sq / (values.len() - 1) as f64
}

// ── Mock probe for testing ──

/// Scripted probe for search-engine tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Invokes `apply` like the real strategies, then pops the next
    /// scripted answer; answers `false` once the script runs dry.
    #[derive(Debug, Default)]
    pub struct ScriptProbe {
        answers: RefCell<VecDeque<bool>>,
        /// Count of probe calls, including ones whose apply failed.
        pub calls: RefCell<usize>,
    }

    impl ScriptProbe {
        pub fn new(answers: Vec<bool>) -> Self {
            ScriptProbe {
                answers: RefCell::new(answers.into()),
                calls: RefCell::new(0),
            }
        }
    }

    impl EmitterProbe for ScriptProbe {
        fn probe(&mut self, apply: &mut dyn FnMut() -> uvc::Result<()>) -> Result<bool> {
            *self.calls.borrow_mut() += 1;
            if !applied(apply)? {
                return Ok(false);
            }
            Ok(self.answers.borrow_mut().pop_front().unwrap_or(false))
        }
    }
}
