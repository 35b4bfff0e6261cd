use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Console settings. Every key is optional in the YAML file; missing keys fall
/// back to the values the motor controller firmware expects.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ConsoleSettings {
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub window_capacity: usize,
    // Initial text of the tuning fields
    pub default_kp: String,
    pub default_ki: String,
    pub default_kd: String,
    pub default_setpoint: String,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            read_timeout_ms: 1000,
            poll_interval_ms: 100,
            window_capacity: crate::rolling_window::DEFAULT_WINDOW_CAPACITY,
            default_kp: "0.5".to_string(),
            default_ki: "0.0001".to_string(),
            default_kd: "0".to_string(),
            default_setpoint: "50".to_string(),
        }
    }
}

impl ConsoleSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(self) -> Result<Self> {
        if self.window_capacity == 0 {
            return Err(anyhow!("window_capacity must be at least 1"));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be at least 1"));
        }
        if self.baud_rate == 0 {
            return Err(anyhow!("baud_rate must be non-zero"));
        }
        Ok(self)
    }
}

/// Load settings from `path`, or the built-in defaults when no path is given.
pub fn load_console_settings(path: Option<&Path>) -> Result<ConsoleSettings> {
    let Some(path) = path else {
        return Ok(ConsoleSettings::default());
    };
    let file = File::open(path)
        .with_context(|| format!("Failed to open console config at {:?}", path))?;
    let settings: ConsoleSettings = serde_yaml::from_reader(file)
        .with_context(|| format!("Invalid console config at {:?}", path))?;
    let settings = settings
        .validate()
        .with_context(|| format!("Rejected console config at {:?}", path))?;

    log::info!(target: "config_loader",
        "ConsoleSettings: baud={}, read_timeout={}ms, poll={}ms, window={} (from {:?})",
        settings.baud_rate, settings.read_timeout_ms, settings.poll_interval_ms,
        settings.window_capacity, path);
    Ok(settings)
}
