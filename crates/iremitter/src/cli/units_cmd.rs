//! `units` subcommand — list the UVC extension units of a device.

use super::{Config, Result, UnitsOutput, resolve_device};
use iremitter_lib::units;

pub(super) fn cmd_units(device: Option<String>, json: bool) -> Result<()> {
    let config = Config::load();
    let device = resolve_device(device, &config);

    let unit_ids = units::enumerate_units(&device)?;
    let usb_ids = units::usb_ids(&device).ok();

    if json {
        let output = UnitsOutput {
            device: device.display().to_string(),
            vendor_id: usb_ids.as_ref().map(|(vid, _)| vid.clone()),
            product_id: usb_ids.as_ref().map(|(_, pid)| pid.clone()),
            units: unit_ids,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output).map_err(std::io::Error::other)?
        );
        return Ok(());
    }

    match &usb_ids {
        Some((vid, pid)) => println!("{} [{vid}:{pid}]", device.display()),
        None => println!("{}", device.display()),
    }
    if unit_ids.is_empty() {
        println!("No extension units declared.");
    } else {
        let list: Vec<String> = unit_ids.iter().map(|u| u.to_string()).collect();
        println!("Extension units: {}", list.join(", "));
    }
    Ok(())
}
