//! iremitter CLI — enable the infrared emitter of UVC webcams.

use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

mod cli;

/// Shared run flag — cleared by the Ctrl+C handler so an in-flight search
/// can restore the camera before exiting.
pub static RUNNING: AtomicBool = AtomicBool::new(true);

#[derive(Parser)]
#[command(
    name = "iremitter",
    version,
    about = "Enable the infrared emitter of UVC webcams"
)]
struct Args {
    /// Output as JSON (for devices, units, config)
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: cli::Command,
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    ctrlc::set_handler(move || {
        RUNNING.store(false, Ordering::SeqCst);
    })
    .ok();

    if let Err(e) = cli::run(args.command, args.json, args.verbose) {
        eprintln!("Error: {e}");
        std::process::exit(cli::exit_code(&e));
    }
}
