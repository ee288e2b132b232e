//! Tool configuration — TOML-based, platform-aware paths.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Header comment prepended to saved config files.
const CONFIG_HEADER: &str =
    "# iremitter configuration — command-line flags take precedence over these values.\n\n";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Camera node to operate on when `--device` is not given.
    #[serde(default = "default_device")]
    pub device: String,

    /// Unconfirmed candidates tried per (unit, selector) pair before the
    /// pair is abandoned.
    #[serde(default = "default_negative_answer_limit")]
    pub negative_answer_limit: u32,

    /// Frames per variance sample in the automatic emitter check.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Milliseconds a candidate is held engaged before the manual prompt.
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,
}

fn default_device() -> String {
    "/dev/video0".into()
}
fn default_negative_answer_limit() -> u32 {
    40
}
fn default_sample_size() -> usize {
    crate::probe::DEFAULT_SAMPLE_SIZE
}
fn default_dwell_ms() -> u64 {
    crate::probe::DEFAULT_DWELL.as_millis() as u64
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device: default_device(),
            negative_answer_limit: default_negative_answer_limit(),
            sample_size: default_sample_size(),
            dwell_ms: default_dwell_ms(),
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("iremitter"))
    }

    /// Full path to the config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Directory holding saved driver records.
    pub fn drivers_dir() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("drivers"))
    }

    /// Flat file of (unit, selector) pairs excluded from future searches.
    pub fn excluded_path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("excluded"))
    }

    /// Load config from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Load config from the default path, returning the config and any
    /// parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Load config from an arbitrary path.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Save config to the default platform path.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config directory",
            ));
        };
        self.save_to(&path)
    }

    /// Save config to an arbitrary path atomically (temp file, then rename).
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let serialized = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        let contents = format!("{CONFIG_HEADER}{serialized}");
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &contents)?;
        match std::fs::rename(&tmp, path) {
            Ok(()) => Ok(()),
            Err(_) => {
                // Rename can fail across filesystems; fall back to direct write.
                let result = std::fs::write(path, &contents);
                let _ = std::fs::remove_file(&tmp);
                result
            }
        }
    }

    /// Reject values the search or the statistics cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.negative_answer_limit == 0 {
            return Err("negative_answer_limit must be at least 1".into());
        }
        if self.sample_size < 2 {
            return Err("sample_size must be at least 2 for the variance comparison".into());
        }
        if self.device.trim().is_empty() {
            return Err("device must not be empty".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.device, "/dev/video0");
        assert_eq!(config.negative_answer_limit, 40);
        assert_eq!(config.sample_size, 30);
        assert_eq!(config.dwell_ms, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            device: "/dev/video2".into(),
            negative_answer_limit: 5,
            sample_size: 10,
            dwell_ms: 1500,
        };
        config.save_to(&path).unwrap();

        let (loaded, warnings) = Config::load_from(&path);
        assert!(warnings.is_empty());
        assert_eq!(loaded.device, "/dev/video2");
        assert_eq!(loaded.negative_answer_limit, 5);
        assert_eq!(loaded.sample_size, 10);
        assert_eq!(loaded.dwell_ms, 1500);
    }

    #[test]
    fn saved_file_carries_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().save_to(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# iremitter configuration"));
    }

    #[test]
    fn missing_file_loads_defaults_silently() {
        let (config, warnings) = Config::load_from(Path::new("/nonexistent/config.toml"));
        assert!(warnings.is_empty());
        assert_eq!(config.device, "/dev/video0");
    }

    #[test]
    fn unparseable_file_warns_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid toml [").unwrap();
        let (config, warnings) = Config::load_from(&path);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("using defaults"));
        assert_eq!(config.negative_answer_limit, 40);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "device = \"/dev/video5\"\n").unwrap();
        let (config, warnings) = Config::load_from(&path);
        assert!(warnings.is_empty());
        assert_eq!(config.device, "/dev/video5");
        assert_eq!(config.sample_size, 30);
    }

    #[test]
    fn validation_rejects_degenerate_values() {
        let mut config = Config::default();
        config.negative_answer_limit = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sample_size = 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.device = "  ".into();
        assert!(config.validate().is_err());
    }
}
