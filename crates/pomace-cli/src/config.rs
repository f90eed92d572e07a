//! Bridge configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! `POMACE_*` environment variables. Command-line flags are applied last by
//! the caller.

use std::path::{Path, PathBuf};

use pomace_serial::{FrameTiming, SerialSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the serial device.
pub const ENV_SERIAL_PORT: &str = "POMACE_SERIAL_PORT";
/// Environment variable for the baud rate.
pub const ENV_SERIAL_BAUD: &str = "POMACE_SERIAL_BAUD";
/// Environment variable for the per-read timeout, in seconds.
pub const ENV_SERIAL_TIMEOUT_S: &str = "POMACE_SERIAL_TIMEOUT_S";
/// Environment variable for the command timeout, in seconds.
pub const ENV_COMMAND_TIMEOUT_S: &str = "POMACE_COMMAND_TIMEOUT_S";
/// Environment variable for the tail wait, in seconds.
pub const ENV_COMMAND_TAIL_WAIT_S: &str = "POMACE_COMMAND_TAIL_WAIT_S";

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for this schema.
    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An environment variable holds an unusable value.
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Full bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Serial port settings.
    pub serial: SerialSettings,
    /// Response framing windows.
    pub timing: FrameTiming,
}

impl BridgeConfig {
    /// Load defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => BridgeConfig::default(),
        };
        config.apply_env_from(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Read a YAML config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Override fields from environment-style lookups.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_SERIAL_PORT) {
            self.serial.port = port;
        }
        if let Some(value) = lookup(ENV_SERIAL_BAUD) {
            self.serial.baud = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_SERIAL_BAUD,
                value,
            })?;
        }
        if let Some(value) = lookup(ENV_SERIAL_TIMEOUT_S) {
            self.serial.read_timeout_ms = seconds_to_ms(ENV_SERIAL_TIMEOUT_S, value)?;
        }
        if let Some(value) = lookup(ENV_COMMAND_TIMEOUT_S) {
            self.timing.command_timeout_ms = seconds_to_ms(ENV_COMMAND_TIMEOUT_S, value)?;
        }
        if let Some(value) = lookup(ENV_COMMAND_TAIL_WAIT_S) {
            self.timing.tail_wait_ms = seconds_to_ms(ENV_COMMAND_TAIL_WAIT_S, value)?;
        }
        Ok(())
    }
}

/// Parse fractional seconds into whole milliseconds.
fn seconds_to_ms(name: &'static str, value: String) -> Result<u64, ConfigError> {
    match value.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok((secs * 1000.0).round() as u64),
        _ => Err(ConfigError::InvalidEnv { name, value }),
    }
}
