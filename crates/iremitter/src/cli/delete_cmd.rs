//! `delete` subcommand — remove the saved driver for a device.

use super::{Config, IremitterError, Result, resolve_device};
use iremitter_lib::driver::Driver;
use iremitter_lib::probe::ask_yes_no;

pub(super) fn cmd_delete(device: Option<String>, yes: bool) -> Result<()> {
    let config = Config::load();
    let device = resolve_device(device, &config);

    let path = Driver::path_for(&device)
        .ok_or_else(|| IremitterError::Driver("no config directory".into()))?;
    if !path.exists() {
        println!("No saved driver for {}.", device.display());
        return Ok(());
    }

    if !yes {
        let prompt = format!("Delete the saved driver for {} ? Yes/No ? ", device.display());
        let stdin = std::io::stdin();
        if !ask_yes_no(&prompt, &mut stdin.lock(), &mut std::io::stdout()) {
            println!("Aborted.");
            return Ok(());
        }
    }

    Driver::delete_for(&device)?;
    println!("Deleted {}.", path.display());
    Ok(())
}
