use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::debounce::DEFAULT_THRESHOLD;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub digital_threshold: u16,
    pub debounce_ms: u64,
    pub loop_delay_ms: u64,
    pub reference_voltage: f32,
    pub spi_clock_hz: u32,
    pub chip_select_pins: Vec<u8>, // BCM numbering, one per chip
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: String::from("127.0.0.1"),
            port: 5009,
            digital_threshold: DEFAULT_THRESHOLD,
            debounce_ms: 50,
            loop_delay_ms: 10,
            reference_voltage: 3.3,
            spi_clock_hz: 1_000_000,
            chip_select_pins: vec![5, 6, 13, 19],
        }
    }
}

/// Values given on the command line; each one wins over the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub digital_threshold: Option<u16>,
    pub debounce_ms: Option<u64>,
    pub loop_delay_ms: Option<u64>,
}

impl Config {
    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn loop_delay(&self) -> Duration {
        Duration::from_millis(self.loop_delay_ms)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let loaded: Config = serde_json::from_str(&content)?;
        Ok(loaded)
    }

    /// Like [`Config::load`], but a missing file means defaults.
    /// A file that exists and does not parse is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => Config::load(path),
            Some(path) => {
                warn!(path = %path.display(), "config file not found, using defaults");
                Ok(Config::default())
            }
            None => Ok(Config::default()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(threshold) = overrides.digital_threshold {
            self.digital_threshold = threshold;
        }
        if let Some(debounce_ms) = overrides.debounce_ms {
            self.debounce_ms = debounce_ms;
        }
        if let Some(loop_delay_ms) = overrides.loop_delay_ms {
            self.loop_delay_ms = loop_delay_ms;
        }
    }
}
