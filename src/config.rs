//! Application configuration
//!
//! Loaded from `config.toml` in the platform config directory, falling
//! back to defaults matching the shipped hardware build (5 faders,
//! 10-bit readings, 115200 baud). Every field is optional in the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_CHANNEL_COUNT, DEFAULT_MAX_RAW_LEVEL, DEFAULT_SERIAL_TIMEOUT_MS,
    SNAPSHOT_MAX_AGE_MS,
};
use crate::error::{Error, Result};

/// Serial link settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SerialConfig {
    /// Port name, e.g. `COM11` or `/dev/ttyACM0`
    pub port: String,
    /// Baud rate
    pub baud: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "COM11".to_string(),
            baud: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_SERIAL_TIMEOUT_MS,
        }
    }
}

impl SerialConfig {
    /// Read timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Fader panel settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PanelConfig {
    /// Number of fader channels on the panel
    pub channels: usize,
    /// Largest raw level the firmware reports
    pub max_raw: u16,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNEL_COUNT,
            max_raw: DEFAULT_MAX_RAW_LEVEL,
        }
    }
}

/// Session directory settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionsConfig {
    /// Snapshot age in milliseconds after which a read refreshes it
    pub snapshot_max_age_ms: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            snapshot_max_age_ms: SNAPSHOT_MAX_AGE_MS,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub panel: PanelConfig,
    pub sessions: SessionsConfig,
}

impl AppConfig {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "fader-bridge")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from the default location; missing file means defaults
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from a specific TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.panel.channels == 0 {
            return Err(Error::Config("panel.channels must be at least 1".into()));
        }
        if self.panel.max_raw == 0 {
            return Err(Error::Config("panel.max_raw must be at least 1".into()));
        }
        if self.serial.baud == 0 {
            return Err(Error::Config("serial.baud must be nonzero".into()));
        }
        Ok(())
    }
}
