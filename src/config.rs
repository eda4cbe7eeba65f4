//! Configuration Module
//!
//! Handles loading process-wide cold storage settings from environment variables.

use std::env;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ColdStorageError, Result};
use crate::tasks::MIN_SWEEP_INTERVAL;

/// Longest accepted sweep period.
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cold storage configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of entries per store, None = unbounded
    pub max_entries: Option<NonZeroUsize>,
    /// Period of the background expiry sweep, None = lazy expiry only
    pub sweep_interval: Option<Duration>,
    /// Whether concurrent misses on one key share a single computation
    pub single_flight: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `COLD_STORAGE_MAX_ENTRIES` - Capacity bound, `0` for unbounded (default: 1000)
    /// - `COLD_STORAGE_SWEEP_INTERVAL_MS` - Sweep period, `0` disables it (default: 1000)
    /// - `COLD_STORAGE_SINGLE_FLIGHT` - `true`/`false`/`1`/`0` (default: true)
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let max_entries = match parse_var::<usize>(&lookup, "COLD_STORAGE_MAX_ENTRIES") {
            Some(n) => NonZeroUsize::new(n),
            None => defaults.max_entries,
        };
        let sweep_interval = match parse_var::<u64>(&lookup, "COLD_STORAGE_SWEEP_INTERVAL_MS") {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.sweep_interval,
        };
        let single_flight = lookup("COLD_STORAGE_SINGLE_FLIGHT")
            .and_then(|v| parse_flag(&v))
            .unwrap_or(defaults.single_flight);

        Self {
            max_entries,
            sweep_interval,
            single_flight,
        }
    }

    /// Rejects settings the runtime cannot honor.
    pub fn validate(&self) -> Result<()> {
        match self.sweep_interval {
            Some(interval) if interval > MAX_SWEEP_INTERVAL => {
                Err(ColdStorageError::InvalidConfig(format!(
                    "sweep interval of {}ms exceeds the maximum of {}ms",
                    interval.as_millis(),
                    MAX_SWEEP_INTERVAL.as_millis()
                )))
            }
            Some(interval) if interval < MIN_SWEEP_INTERVAL => {
                Err(ColdStorageError::InvalidConfig(format!(
                    "sweep interval must be at least {}ms, use None to disable sweeping",
                    MIN_SWEEP_INTERVAL.as_millis()
                )))
            }
            _ => Ok(()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: NonZeroUsize::new(1000),
            sweep_interval: Some(Duration::from_millis(1000)),
            single_flight: true,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
