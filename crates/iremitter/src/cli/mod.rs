//! CLI subcommands — driver search, replay, emitter testing, maintenance.

mod config_cmd;
mod configure;
mod delete_cmd;
mod devices;
mod run_cmd;
mod test_cmd;
mod units_cmd;

use std::path::PathBuf;

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use iremitter_lib::IremitterError;
pub(super) use iremitter_lib::capture::VideoDeviceInfo;
pub(super) use iremitter_lib::config::Config;
pub(super) use iremitter_lib::error::Result;

const PADDING: usize = 2;

/// Alignment width for a command's key-value output: longest key + padding.
pub(super) fn kv_width(keys: &[&str]) -> usize {
    keys.iter().map(|k| k.len()).max().unwrap_or(0) + PADDING
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{key:<width$}{value}", width = w);
}

/// The device to operate on: explicit flag first, configured default second.
pub(super) fn resolve_device(flag: Option<String>, config: &Config) -> PathBuf {
    PathBuf::from(flag.unwrap_or_else(|| config.device.clone()))
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct DevicesOutput {
    pub count: usize,
    pub devices: Vec<VideoDeviceInfo>,
}

#[derive(Serialize)]
pub(super) struct UnitsOutput {
    pub device: String,
    pub vendor_id: Option<String>,
    pub product_id: Option<String>,
    pub units: Vec<u8>,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub drivers_dir: Option<String>,
    pub excluded_file: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Search for a control that fires the infrared emitter and save it
    Configure {
        /// Camera node (default: configured device)
        #[arg(short, long)]
        device: Option<String>,
        /// Confirm emission at the terminal instead of by frame statistics
        #[arg(short, long)]
        manual: bool,
        /// Unconfirmed candidates tried per (unit, selector) pair
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Re-apply the saved driver (run this after each boot)
    Run {
        /// Camera node (default: configured device)
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Check whether the emitter currently works
    Test {
        /// Camera node (default: configured device)
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Delete the saved driver for a device
    Delete {
        /// Camera node (default: configured device)
        #[arg(short, long)]
        device: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List video capture devices
    Devices,

    /// List the UVC extension units of a device
    Units {
        /// Camera node (default: configured device)
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Show current configuration and file paths
    Config,
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, json: bool, verbose: bool) -> Result<()> {
    match cmd {
        Command::Configure {
            device,
            manual,
            limit,
        } => {
            if json {
                warn_json_unsupported("configure");
            }
            configure::cmd_configure(device, manual, limit, verbose)
        }
        Command::Run { device } => {
            if json {
                warn_json_unsupported("run");
            }
            run_cmd::cmd_run(device)
        }
        Command::Test { device } => {
            if json {
                warn_json_unsupported("test");
            }
            test_cmd::cmd_test(device)
        }
        Command::Delete { device, yes } => {
            if json {
                warn_json_unsupported("delete");
            }
            delete_cmd::cmd_delete(device, yes)
        }
        Command::Devices => devices::cmd_devices(json),
        Command::Units { device } => units_cmd::cmd_units(device, json),
        Command::Config => config_cmd::cmd_config(json),
    }
}

/// Process exit code for a failed command.
///
/// An unreachable camera exits 126 so scripts can tell "camera busy or
/// permission denied" apart from "searched and found nothing" (1).
pub fn exit_code(e: &IremitterError) -> i32 {
    if iremitter_lib::error::is_device_unavailable(e) {
        126
    } else {
        1
    }
}
