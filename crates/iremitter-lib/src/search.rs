//! The driver search engine.
//!
//! Walks every (extension unit, selector) pair of a camera in a fixed
//! order, steps each writable control from its current value toward its
//! maximum by the hardware-reported resolution, and probes after each
//! applied candidate whether the infrared emitter fired. The first
//! confirmed candidate wins; everything else is restored to the value it
//! had before the pair's walk.
//!
//! The engine runs strictly sequentially: every `set_current` mutates live
//! hardware state, and the camera is treated as exclusively owned for the
//! duration of a search.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::driver::Driver;
use crate::probe::{EmitterProbe, ProbeError};
use crate::uvc::{UvcError, UvcQuery};

// ── Error type ──

/// Search outcomes other than a discovered driver.
#[derive(Debug)]
pub enum SearchError {
    /// The emitter already fires before any candidate was tried; searching
    /// could corrupt a working configuration.
    DriverAlreadyExists,
    /// The camera became unreachable. `pair` is the (unit, selector) whose
    /// walk was in flight, if any, so callers can exclude it next run.
    DeviceUnavailable {
        reason: String,
        pair: Option<(u8, u8)>,
    },
    /// Every candidate was tried and none fired the emitter. A normal, if
    /// disappointing, outcome.
    NotFound,
    /// The run was interrupted from outside (Ctrl-C).
    Interrupted,
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::DriverAlreadyExists => {
                write!(f, "the emitter already works; nothing to configure")
            }
            SearchError::DeviceUnavailable { reason, .. } => write!(
                f,
                "cannot reach the camera: {reason} \
                 (close other applications using it, or check permissions on the video node)"
            ),
            SearchError::NotFound => {
                write!(f, "no working control found; the search space is exhausted")
            }
            SearchError::Interrupted => write!(f, "search interrupted"),
        }
    }
}

impl std::error::Error for SearchError {}

// ── Value walk ──

/// Component-wise `current + resolution`, or `None` once any byte would
/// pass its maximum. No wraparound: the first overflowing byte ends the
/// pair's walk.
fn advance(current: &[u8], resolution: &[u8], maximum: &[u8]) -> Option<Vec<u8>> {
    let mut next = Vec::with_capacity(current.len());
    for ((&cur, &res), &max) in current.iter().zip(resolution).zip(maximum) {
        let value = u16::from(cur) + u16::from(res);
        if value > u16::from(max) {
            return None;
        }
        next.push(value as u8);
    }
    Some(next)
}

/// How one pair's value walk ended.
enum WalkEnd {
    Confirmed,
    Exhausted,
    LimitReached,
    Interrupted,
}

// ── Finder ──

/// The search engine for one camera.
///
/// Candidates are visited in ascending unit order (outer) and ascending
/// selector order 0..=255 (inner) so repeated runs against the same
/// hardware explore identically.
pub struct Finder<'a, Q: UvcQuery, P: EmitterProbe> {
    device: PathBuf,
    query: &'a Q,
    probe: &'a mut P,
    units: Vec<u8>,
    negative_answer_limit: u32,
    excluded: Vec<(u8, u8)>,
    running: Option<&'a AtomicBool>,
}

impl<'a, Q: UvcQuery, P: EmitterProbe> Finder<'a, Q, P> {
    /// `negative_answer_limit` bounds how many unconfirmed candidates are
    /// tried per (unit, selector) pair before it is abandoned.
    pub fn new(
        device: impl AsRef<Path>,
        query: &'a Q,
        probe: &'a mut P,
        units: Vec<u8>,
        negative_answer_limit: u32,
    ) -> Self {
        let mut units = units;
        units.sort_unstable();
        units.dedup();
        Finder {
            device: device.as_ref().to_path_buf(),
            query,
            probe,
            units,
            negative_answer_limit,
            excluded: Vec::new(),
            running: None,
        }
    }

    /// Pairs to skip entirely (known to freeze the camera).
    pub fn exclude(mut self, pairs: Vec<(u8, u8)>) -> Self {
        self.excluded = pairs;
        self
    }

    /// Shared run flag; the walk aborts cleanly once it reads false.
    pub fn running_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.running = Some(flag);
        self
    }

    /// Find one control that fires the emitter.
    ///
    /// Fails fast with [`SearchError::DriverAlreadyExists`] when the
    /// emitter fires before anything is written; no control is queried in
    /// that case. A vanished device aborts the whole enumeration
    /// immediately. Exhausting every candidate is [`SearchError::NotFound`].
    pub fn find(&mut self) -> Result<Driver, SearchError> {
        if self.probe.probe(&mut || Ok(())).map_err(|e| fatal(e, None))? {
            return Err(SearchError::DriverAlreadyExists);
        }

        for i in 0..self.units.len() {
            let unit = self.units[i];
            for selector in 0..=u8::MAX {
                if self.excluded.contains(&(unit, selector)) {
                    log::debug!("unit {unit} selector {selector}: excluded, skipping");
                    continue;
                }
                if let Some(control) = self.walk_pair(unit, selector)? {
                    log::info!(
                        "emitter confirmed on unit {unit} selector {selector} with {control:?}"
                    );
                    return Ok(Driver::new(&self.device, unit, selector, control));
                }
            }
        }

        Err(SearchError::NotFound)
    }

    /// Walk one pair's value space. `Ok(Some(control))` is a confirmed
    /// winner (the device is left at that value); `Ok(None)` means the pair
    /// was skipped, exhausted or abandoned, with its initial value restored.
    fn walk_pair(&mut self, unit: u8, selector: u8) -> Result<Option<Vec<u8>>, SearchError> {
        let query = self.query;
        let pair = Some((unit, selector));

        let size = match query.query_length(unit, selector) {
            Ok(size) if size > 0 => size,
            Ok(_) => return Ok(None),
            Err(e) => return skip_or_fatal(e, pair),
        };
        let current = match query.query_current(unit, selector, size) {
            Ok(current) => current,
            Err(e) => return skip_or_fatal(e, pair),
        };
        // A control that rejects its own current value is not writable.
        if let Err(e) = query.set_current(unit, selector, &current) {
            return skip_or_fatal(e, pair);
        }
        let maximum = match query.query_maximum(unit, selector, size) {
            Ok(maximum) => maximum,
            Err(e) => return skip_or_fatal(e, pair),
        };
        // The maximum is the bound, not a candidate; a control already
        // sitting there has nowhere to go.
        if current == maximum {
            return Ok(None);
        }
        let resolution = match query.query_resolution(unit, selector, size) {
            Ok(resolution) => resolution,
            Err(UvcError::Unavailable(reason)) => {
                return Err(SearchError::DeviceUnavailable { reason, pair });
            }
            // Best-effort substitute when the hardware has no resolution
            // query; may misrepresent the true step size.
            Err(UvcError::Failed(_)) => current
                .iter()
                .zip(&maximum)
                .map(|(c, m)| u8::from(c != m))
                .collect(),
        };
        // A zero step can never reach the overflow bound.
        if resolution.iter().all(|&r| r == 0) {
            return Ok(None);
        }

        log::debug!(
            "unit {unit} selector {selector}: size {size}, current {current:?}, \
             maximum {maximum:?}, resolution {resolution:?}"
        );

        let initial = current.clone();
        let mut next = current;
        let mut negative_answers = 0u32;

        let end = loop {
            if let Some(flag) = self.running
                && !flag.load(Ordering::SeqCst)
            {
                break WalkEnd::Interrupted;
            }
            let Some(candidate) = advance(&next, &resolution, &maximum) else {
                break WalkEnd::Exhausted;
            };
            next = candidate;
            log::debug!("unit {unit} selector {selector}: trying {next:?}");

            let applied = next.clone();
            match self
                .probe
                .probe(&mut || query.set_current(unit, selector, &applied))
            {
                Ok(true) => break WalkEnd::Confirmed,
                Ok(false) => {
                    negative_answers += 1;
                    if negative_answers >= self.negative_answer_limit {
                        break WalkEnd::LimitReached;
                    }
                }
                Err(e) => return Err(fatal(e, pair)),
            }
        };

        match end {
            // The winning value stays applied; only losing pairs restore.
            WalkEnd::Confirmed => Ok(Some(next)),
            WalkEnd::Exhausted => {
                restore(query, unit, selector, &initial);
                Ok(None)
            }
            WalkEnd::LimitReached => {
                log::debug!(
                    "unit {unit} selector {selector}: \
                     negative answer limit reached, skipping"
                );
                restore(query, unit, selector, &initial);
                Ok(None)
            }
            WalkEnd::Interrupted => {
                restore(query, unit, selector, &initial);
                Err(SearchError::Interrupted)
            }
        }
    }
}

/// Best-effort restoration of a pair's initial value; failure is surfaced
/// in diagnostics but never aborts the search.
fn restore<Q: UvcQuery>(query: &Q, unit: u8, selector: u8, initial: &[u8]) {
    if let Err(e) = query.set_current(unit, selector, initial) {
        log::warn!("unit {unit} selector {selector}: could not restore initial value: {e}");
    }
}

/// Expected query failures skip the pair; a vanished device is fatal.
fn skip_or_fatal(e: UvcError, pair: Option<(u8, u8)>) -> Result<Option<Vec<u8>>, SearchError> {
    match e {
        UvcError::Failed(_) => Ok(None),
        UvcError::Unavailable(reason) => Err(SearchError::DeviceUnavailable { reason, pair }),
    }
}

fn fatal(e: ProbeError, pair: Option<(u8, u8)>) -> SearchError {
    match e {
        ProbeError::Unavailable(reason) => SearchError::DeviceUnavailable { reason, pair },
    }
}
