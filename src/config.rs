//! Plow configuration.
//!
//! Loaded from `~/.plow/config.toml`. A missing file means defaults.
//!
//! Settings that can also be given per command resolve through a chain:
//!
//! 1. the command-line flag
//! 2. an environment variable (`PLOW_DATA_DIR`, `PLOW_GPS_DEVICE`)
//! 3. the config file
//! 4. the built-in default, where there is one

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use plow::position::SamplingPolicy;
use plow::storage;

/// Plow configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Directory holding `plow.sqlite`.
    pub data_dir: Option<PathBuf>,

    /// NMEA device or log file to read positions from.
    /// Without one, this host has no location capability.
    pub gps_device: Option<PathBuf>,

    pub gps: GpsConfig,
}

/// Sampling settings for the position source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GpsConfig {
    pub high_accuracy: bool,
    pub maximum_age_secs: u64,
    pub timeout_secs: u64,
}

impl Default for GpsConfig {
    fn default() -> Self {
        let policy = SamplingPolicy::default();
        Self {
            high_accuracy: policy.high_accuracy,
            maximum_age_secs: policy.maximum_age.as_secs(),
            timeout_secs: policy.timeout.as_secs(),
        }
    }
}

impl GpsConfig {
    pub fn policy(&self) -> SamplingPolicy {
        SamplingPolicy {
            high_accuracy: self.high_accuracy,
            maximum_age: Duration::from_secs(self.maximum_age_secs),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl Config {
    /// Load config from `~/.plow/config.toml`, or defaults if there is none.
    pub fn load() -> Result<Self, String> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        let config: Self = toml::from_str(&contents)
            .map_err(|e| format!("invalid config at {}: {e}", path.display()))?;

        if config.gps.timeout_secs == 0 {
            return Err(format!(
                "gps.timeout-secs must be at least 1 in {}",
                path.display()
            ));
        }

        Ok(config)
    }

    /// The config file path: `~/.plow/config.toml`.
    pub fn path() -> Option<PathBuf> {
        storage::default_root().map(|root| root.join("config.toml"))
    }

    /// Resolve the data directory.
    pub fn data_dir(&self, explicit: Option<&Path>) -> Result<PathBuf, String> {
        if let Some(dir) = explicit {
            return Ok(dir.to_path_buf());
        }
        if let Some(dir) = env_path("PLOW_DATA_DIR") {
            return Ok(dir);
        }
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        storage::default_root().ok_or_else(|| "could not determine home directory".to_string())
    }

    /// Resolve the GPS device, if any is configured.
    pub fn gps_device(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| env_path("PLOW_GPS_DEVICE"))
            .or_else(|| self.gps_device.clone())
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();

        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.gps.policy(), SamplingPolicy::default());
    }

    #[test]
    fn parses_kebab_case_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
data-dir = "/srv/plow"
gps-device = "/dev/ttyACM0"

[gps]
high-accuracy = false
timeout-secs = 10
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/plow")));
        assert_eq!(config.gps_device, Some(PathBuf::from("/dev/ttyACM0")));
        let policy = config.gps.policy();
        assert!(!policy.high_accuracy);
        assert_eq!(policy.timeout, Duration::from_secs(10));
        assert_eq!(policy.maximum_age, Duration::from_secs(30));
    }

    #[test]
    fn invalid_file_names_the_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "data-dir = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();

        assert!(err.contains("invalid config at"));
        assert!(err.contains("config.toml"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[gps]\ntimeout-secs = 0\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn explicit_flags_win() {
        // Explicit values short-circuit before the env and the file.
        let config = Config {
            data_dir: Some(PathBuf::from("/from/config")),
            gps_device: Some(PathBuf::from("/dev/from-config")),
            gps: GpsConfig::default(),
        };

        assert_eq!(
            config.data_dir(Some(Path::new("/from/flag"))).unwrap(),
            PathBuf::from("/from/flag")
        );
        assert_eq!(
            config.gps_device(Some(Path::new("/dev/from-flag"))),
            Some(PathBuf::from("/dev/from-flag"))
        );
    }
}
