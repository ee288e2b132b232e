//! `config` subcommand — show configuration values and file paths.

use super::{Config, ConfigOutput, Result, kv, kv_width};

pub(super) fn cmd_config(json: bool) -> Result<()> {
    let (config, warnings) = Config::load_with_warnings();
    for w in &warnings {
        log::warn!("{w}");
    }

    let config_file = Config::path();
    let drivers_dir = Config::drivers_dir();
    let excluded_file = Config::excluded_path();

    if json {
        let output = ConfigOutput {
            config_file: config_file.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_file.as_ref().is_some_and(|p| p.exists()),
            settings: config,
            drivers_dir: drivers_dir.as_ref().map(|p| p.display().to_string()),
            excluded_file: excluded_file.as_ref().map(|p| p.display().to_string()),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output).map_err(std::io::Error::other)?
        );
        return Ok(());
    }

    let w = kv_width(&[
        "Config file:",
        "Drivers dir:",
        "Excluded file:",
        "Device:",
        "Negative answer limit:",
        "Sample size:",
        "Dwell (ms):",
    ]);

    match &config_file {
        Some(path) => {
            let state = if path.exists() { "exists" } else { "defaults" };
            kv("Config file:", format_args!("{} ({state})", path.display()), w);
        }
        None => kv("Config file:", "unavailable", w),
    }
    if let Some(path) = &drivers_dir {
        kv("Drivers dir:", path.display(), w);
    }
    if let Some(path) = &excluded_file {
        kv("Excluded file:", path.display(), w);
    }
    println!();
    kv("Device:", &config.device, w);
    kv("Negative answer limit:", config.negative_answer_limit, w);
    kv("Sample size:", config.sample_size, w);
    kv("Dwell (ms):", config.dwell_ms, w);
    Ok(())
}
