//! `run` subcommand — re-apply the saved driver (typically at boot).

use super::{Config, IremitterError, Result, resolve_device};
use iremitter_lib::driver::Driver;
use iremitter_lib::uvc::UvcDevice;

pub(super) fn cmd_run(device: Option<String>) -> Result<()> {
    let config = Config::load();
    let device = resolve_device(device, &config);

    let driver = Driver::load_for(&device)?.ok_or_else(|| {
        IremitterError::Driver(format!(
            "no saved driver for {}; run `iremitter configure` first",
            device.display()
        ))
    })?;

    let uvc = UvcDevice::open(&device)?;
    driver.apply(&uvc)?;
    log::debug!("applied {driver}");
    println!("Infrared emitter control applied to {}", device.display());
    Ok(())
}
