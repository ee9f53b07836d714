//! Configuration management for winsvc-bridge

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming a JSON configuration file
pub const CONFIG_PATH_ENV: &str = "WINSVC_BRIDGE_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interval between status queries while waiting for a transition (in milliseconds)
    pub poll_interval_ms: u64,

    /// How long to wait for a start/stop transition before giving up (in seconds)
    pub transition_timeout_secs: u64,

    /// Capacity of the queue carrying runtime events to application callbacks
    pub event_queue_capacity: usize,

    /// Log level used by the binaries when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            transition_timeout_secs: 60,
            event_queue_capacity: 16,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the file named by `WINSVC_BRIDGE_CONFIG` (if
    /// any), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::load_from(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        config.validate_and_fix();
        Ok(config)
    }

    /// Load configuration from a JSON file; missing fields take defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;
        config.validate_and_fix();
        debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(value) = env_number("WINSVC_POLL_INTERVAL_MS") {
            self.poll_interval_ms = value;
        }
        if let Some(value) = env_number("WINSVC_TRANSITION_TIMEOUT_SECS") {
            self.transition_timeout_secs = value;
        }
        if let Some(value) = env_number("WINSVC_EVENT_QUEUE_CAPACITY") {
            self.event_queue_capacity = value as usize;
        }
    }

    /// Replace unusable values with defaults
    pub fn validate_and_fix(&mut self) {
        let defaults = Self::default();
        if self.poll_interval_ms == 0 {
            warn!("poll_interval_ms must be positive, using {}", defaults.poll_interval_ms);
            self.poll_interval_ms = defaults.poll_interval_ms;
        }
        if self.transition_timeout_secs == 0 {
            warn!(
                "transition_timeout_secs must be positive, using {}",
                defaults.transition_timeout_secs
            );
            self.transition_timeout_secs = defaults.transition_timeout_secs;
        }
        if self.poll_interval_ms > self.transition_timeout_secs * 1000 {
            warn!(
                "poll interval ({}ms) exceeds the transition timeout, capping it",
                self.poll_interval_ms
            );
            self.poll_interval_ms = self.transition_timeout_secs * 1000;
        }
        if self.event_queue_capacity == 0 {
            self.event_queue_capacity = defaults.event_queue_capacity;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn transition_timeout(&self) -> Duration {
        Duration::from_secs(self.transition_timeout_secs)
    }
}

fn env_number(key: &str) -> Option<u64> {
    let value = env::var(key).ok()?;
    match value.parse::<u64>() {
        Ok(parsed) => {
            debug!("{} override from environment: {}", key, parsed);
            Some(parsed)
        }
        Err(_) => {
            warn!("Invalid {} value: {}", key, value);
            None
        }
    }
}
