//! `test` subcommand — check whether the emitter currently works.
//!
//! The check is interactive: the automatic variance comparison needs a
//! state transition to observe, so the saved driver is replayed as that
//! transition when one exists, and the operator gives the verdict.

use std::time::Duration;

use super::{Config, Result, resolve_device};
use iremitter_lib::capture::V4lFrameSource;
use iremitter_lib::driver::Driver;
use iremitter_lib::probe::{EmitterProbe, ManualProbe};
use iremitter_lib::uvc::UvcDevice;

pub(super) fn cmd_test(device: Option<String>) -> Result<()> {
    let config = Config::load();
    let device = resolve_device(device, &config);

    let source = V4lFrameSource::new(&device);
    let mut probe = ManualProbe::new(source, Duration::from_millis(config.dwell_ms));

    let saved = Driver::load_for(&device)?;
    let working = match &saved {
        Some(driver) => {
            let uvc = UvcDevice::open(&device)?;
            log::debug!("replaying {driver}");
            probe.probe(&mut || driver.apply(&uvc))?
        }
        None => {
            log::info!("no saved driver; observing the camera as-is");
            probe.probe(&mut || Ok(()))?
        }
    };

    if working {
        println!("The infrared emitter is working.");
        Ok(())
    } else {
        println!("The infrared emitter is NOT working.");
        std::process::exit(1);
    }
}
