//! Known-bad (unit, selector) pairs.
//!
//! When a pair's walk leaves the camera unreachable, the pair is recorded
//! here so the next run — typically after a reboot brought the camera
//! back — skips it instead of freezing the device again. One
//! "unit selector" pair per line; anything unparseable is ignored.

use std::io::{self, Write};
use std::path::Path;

use crate::config::Config;

/// Load the excluded pairs from the default location; empty when the file
/// is missing or there is no config directory.
pub fn load() -> Vec<(u8, u8)> {
    match Config::excluded_path() {
        Some(path) => load_from(&path),
        None => Vec::new(),
    }
}

/// Load excluded pairs from an arbitrary path; missing file is empty.
pub fn load_from(path: &Path) -> Vec<(u8, u8)> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    contents.lines().filter_map(parse_line).collect()
}

/// Append one pair to the default location.
pub fn append(unit: u8, selector: u8) -> io::Result<()> {
    let Some(path) = Config::excluded_path() else {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "No config directory",
        ));
    };
    append_to(&path, unit, selector)
}

/// Append one pair to an arbitrary path, creating parents as needed.
pub fn append_to(path: &Path, unit: u8, selector: u8) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{unit} {selector}")
}

fn parse_line(line: &str) -> Option<(u8, u8)> {
    let mut parts = line.split_whitespace();
    let unit = parts.next()?.parse().ok()?;
    let selector = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((unit, selector))
}
