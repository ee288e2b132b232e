//! The discovered driver record and its persistence.
//!
//! "Driver" here is not a kernel driver: it is the (device, unit, selector,
//! control) tuple that reproducibly fires the infrared emitter when written
//! back to the camera. Records are created only by a confirmed search,
//! never edited afterwards, and a new record for the same device replaces
//! the old one wholesale.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::uvc::{self, UvcQuery};

/// Header comment prepended to saved driver files.
const DRIVER_HEADER: &str =
    "# iremitter driver — generated by `iremitter configure`; editing may break the emitter.\n\n";

/// A control sequence that enables the infrared emitter.
///
/// Equality is structural over all four fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    /// Video node the control was found on.
    pub device: PathBuf,
    /// Extension unit ID.
    pub unit: u8,
    /// Control selector within the unit.
    pub selector: u8,
    /// Raw bytes of the working `SET_CUR` request.
    pub control: Vec<u8>,
}

impl Driver {
    pub fn new(device: impl AsRef<Path>, unit: u8, selector: u8, control: Vec<u8>) -> Self {
        Driver {
            device: device.as_ref().to_path_buf(),
            unit,
            selector,
            control,
        }
    }

    /// Write the recorded control back to the camera.
    pub fn apply(&self, query: &impl UvcQuery) -> uvc::Result<()> {
        query.set_current(self.unit, self.selector, &self.control)
    }

    /// File name a device's record is stored under ("video0.toml").
    fn file_name(device: &Path) -> String {
        let name = device
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("driver");
        format!("{name}.toml")
    }

    /// Full path a device's record is stored at, under the config dir.
    pub fn path_for(device: &Path) -> Option<PathBuf> {
        Config::drivers_dir().map(|d| d.join(Self::file_name(device)))
    }

    /// Save to the default location, superseding any previous record.
    pub fn save(&self) -> std::io::Result<PathBuf> {
        let Some(path) = Self::path_for(&self.device) else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config directory",
            ));
        };
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save to an arbitrary path atomically (temp file, then rename).
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let serialized = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        let contents = format!("{DRIVER_HEADER}{serialized}");
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &contents)?;
        match std::fs::rename(&tmp, path) {
            Ok(()) => Ok(()),
            Err(_) => {
                let result = std::fs::write(path, &contents);
                let _ = std::fs::remove_file(&tmp);
                result
            }
        }
    }

    /// Load the saved record for a device; `Ok(None)` when none exists.
    pub fn load_for(device: &Path) -> std::io::Result<Option<Driver>> {
        let Some(path) = Self::path_for(device) else {
            return Ok(None);
        };
        Self::load_from(&path)
    }

    /// Load a record from an arbitrary path; `Ok(None)` when missing.
    pub fn load_from(path: &Path) -> std::io::Result<Option<Driver>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let driver = toml::from_str(&contents).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{}: {e}", path.display()),
            )
        })?;
        Ok(Some(driver))
    }

    /// Delete the saved record for a device; `Ok(false)` when none existed.
    pub fn delete_for(device: &Path) -> std::io::Result<bool> {
        let Some(path) = Self::path_for(device) else {
            return Ok(false);
        };
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} unit {} selector {} control {:?}",
            self.device.display(),
            self.unit,
            self.selector,
            self.control
        )
    }
}
