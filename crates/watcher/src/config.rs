//! Monitor configuration
//!
//! Loaded from TOML or built in code. Out-of-range values are normalized
//! rather than rejected so a bad setting can never produce a busy loop.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Smallest poll delay the scheduler will honour
pub const MIN_DELAY: Duration = Duration::from_millis(20);

/// Default poll delay
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Default number of entries checked before the scheduler pauses
pub const DEFAULT_CHECKS_PER_RUN: usize = 1000;

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Delay between poll cycles in milliseconds (default: 1000)
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Recursive default for newly added paths (default: false)
    #[serde(default)]
    pub recursive: bool,

    /// Entries checked per burst before pausing one delay; 0 disables the pause
    #[serde(default = "default_checks_per_run")]
    pub checks_per_run: usize,

    /// A single capture slower than this is reported as a diagnostic
    #[serde(default = "default_slow_capture_warn_ms")]
    pub slow_capture_warn_ms: u64,

    /// Capacity of each diagnostic subscriber's channel
    #[serde(default = "default_diagnostics_capacity")]
    pub diagnostics_capacity: usize,
}

impl MonitorConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: MonitorConfig = toml::from_str(text)?;
        Ok(config.normalized())
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| match e {
            MonitorError::Toml(inner) => {
                MonitorError::Config(format!("{}: {}", path.display(), inner))
            }
            other => other,
        })
    }

    /// Clamp every field into its valid range
    pub fn normalized(mut self) -> Self {
        self.delay_ms = delay_millis(clamp_delay(Duration::from_millis(self.delay_ms)));
        if self.diagnostics_capacity == 0 {
            warn!("diagnostics_capacity of 0 raised to 1");
            self.diagnostics_capacity = 1;
        }
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn slow_capture_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_capture_warn_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            recursive: false,
            checks_per_run: default_checks_per_run(),
            slow_capture_warn_ms: default_slow_capture_warn_ms(),
            diagnostics_capacity: default_diagnostics_capacity(),
        }
    }
}

/// Raise a delay below [`MIN_DELAY`] to the floor
pub fn clamp_delay(delay: Duration) -> Duration {
    if delay < MIN_DELAY {
        warn!("Poll delay {:?} is below the {:?} floor, using the floor", delay, MIN_DELAY);
        MIN_DELAY
    } else {
        delay
    }
}

/// Whole milliseconds in `delay`, saturating at `u64::MAX`
pub fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

fn default_delay_ms() -> u64 {
    delay_millis(DEFAULT_DELAY)
}

fn default_checks_per_run() -> usize {
    DEFAULT_CHECKS_PER_RUN
}

fn default_slow_capture_warn_ms() -> u64 {
    5_000
}

fn default_diagnostics_capacity() -> usize {
    256
}
