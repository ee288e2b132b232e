//! `configure` subcommand — search for a working emitter control, save it.

use std::path::Path;
use std::time::Duration;

use super::{Config, IremitterError, RUNNING, Result, resolve_device};
use iremitter_lib::capture::V4lFrameSource;
use iremitter_lib::driver::Driver;
use iremitter_lib::probe::{AutoProbe, EmitterProbe, ManualProbe};
use iremitter_lib::search::{Finder, SearchError};
use iremitter_lib::uvc::{UvcDevice, UvcQuery};
use iremitter_lib::{excluded, units};

pub(super) fn cmd_configure(
    device: Option<String>,
    manual: bool,
    limit: Option<u32>,
    verbose: bool,
) -> Result<()> {
    let config = Config::load();
    config.validate().map_err(IremitterError::Config)?;
    let device = resolve_device(device, &config);
    let limit = limit.unwrap_or(config.negative_answer_limit);

    let unit_ids = match units::enumerate_units(&device) {
        Ok(ids) => ids,
        Err(e) => {
            log::warn!(
                "could not enumerate extension units for {}: {e}",
                device.display()
            );
            Vec::new()
        }
    };
    if unit_ids.is_empty() {
        log::warn!("{}: no extension units to search", device.display());
    } else {
        log::info!("extension units: {unit_ids:?}");
    }

    let excluded_pairs = excluded::load();
    let uvc = UvcDevice::open(&device)?;
    let source = V4lFrameSource::new(&device);

    log::info!(
        "searching {} (limit {limit} per pair, {} confirmation)",
        device.display(),
        if manual { "manual" } else { "automatic" }
    );

    let outcome = if manual {
        let mut probe = ManualProbe::new(source, Duration::from_millis(config.dwell_ms));
        search(&device, &uvc, &mut probe, unit_ids, limit, excluded_pairs)
    } else {
        let mut probe = AutoProbe::new(source, config.sample_size).verbose(verbose);
        search(&device, &uvc, &mut probe, unit_ids, limit, excluded_pairs)
    };

    match outcome {
        Ok(driver) => {
            let path = driver.save()?;
            println!("Driver saved to {}", path.display());
            println!("Run `iremitter run` after each boot to re-apply it.");
            Ok(())
        }
        Err(SearchError::DeviceUnavailable { reason, pair }) => {
            // Remember the pair that froze the camera so the next run — after
            // a reboot brought it back — skips it.
            if let Some((unit, selector)) = pair
                && excluded::append(unit, selector).is_ok()
            {
                log::info!("unit {unit} selector {selector} excluded from future searches");
            }
            Err(SearchError::DeviceUnavailable { reason, pair }.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn search<P: EmitterProbe>(
    device: &Path,
    uvc: &impl UvcQuery,
    probe: &mut P,
    unit_ids: Vec<u8>,
    limit: u32,
    excluded_pairs: Vec<(u8, u8)>,
) -> std::result::Result<Driver, SearchError> {
    Finder::new(device, uvc, probe, unit_ids, limit)
        .exclude(excluded_pairs)
        .running_flag(&RUNNING)
        .find()
}
