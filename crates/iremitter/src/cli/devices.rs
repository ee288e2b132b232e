//! `devices` subcommand — list video capture nodes.

use super::{DevicesOutput, Result};
use iremitter_lib::capture::list_video_devices;

pub(super) fn cmd_devices(json: bool) -> Result<()> {
    let devices = list_video_devices();

    if json {
        let output = DevicesOutput {
            count: devices.len(),
            devices,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output).map_err(std::io::Error::other)?
        );
        return Ok(());
    }

    if devices.is_empty() {
        println!("No video capture devices found.");
        return Ok(());
    }
    for device in &devices {
        println!("{}  {}", device.path.display(), device.card);
    }
    Ok(())
}
