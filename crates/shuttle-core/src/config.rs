//! Queue configuration.
//!
//! Every field has a default and can be overridden from the environment.
//! Missing or unparsable variables fall back to the default silently; the merged
//! result is then validated as a whole.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{MAX_PROGRESS, ShuttleError};

pub const DEFAULT_AGING_FACTOR_SECS: u64 = 60;
pub const DEFAULT_PROGRESS_INCREMENT_MIN: u8 = 10;
pub const DEFAULT_PROGRESS_INCREMENT_MAX: u8 = 20;
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Seconds of waiting that earn one point of effective priority.
    pub aging_factor_secs: u64,
    /// Inclusive range of the per-tick progress increment.
    pub progress_increment_min: u8,
    pub progress_increment_max: u8,
    /// Wall-clock period between scheduler ticks.
    pub tick_interval: Duration,
    /// Per-observer buffer of the fan-out channel.
    pub broadcast_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            aging_factor_secs: DEFAULT_AGING_FACTOR_SECS,
            progress_increment_min: DEFAULT_PROGRESS_INCREMENT_MIN,
            progress_increment_max: DEFAULT_PROGRESS_INCREMENT_MAX,
            tick_interval: DEFAULT_TICK_INTERVAL,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl QueueConfig {
    /// Read `AGING_FACTOR`, `PROGRESS_INCREMENT_MIN`, `PROGRESS_INCREMENT_MAX`,
    /// `PROCESSING_INTERVAL` (ms) and `BROADCAST_CAPACITY`.
    pub fn from_env() -> Result<Self, ShuttleError> {
        let d = Self::default();
        let config = Self {
            aging_factor_secs: env_parse("AGING_FACTOR", d.aging_factor_secs),
            progress_increment_min: env_parse("PROGRESS_INCREMENT_MIN", d.progress_increment_min),
            progress_increment_max: env_parse("PROGRESS_INCREMENT_MAX", d.progress_increment_max),
            tick_interval: Duration::from_millis(env_parse(
                "PROCESSING_INTERVAL",
                d.tick_interval.as_millis() as u64,
            )),
            broadcast_capacity: env_parse("BROADCAST_CAPACITY", d.broadcast_capacity),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ShuttleError> {
        if self.aging_factor_secs == 0 {
            return Err(ShuttleError::invalid_config(
                "aging_factor_secs",
                "must be at least 1",
            ));
        }
        if self.progress_increment_min == 0 {
            return Err(ShuttleError::invalid_config(
                "progress_increment_min",
                "must be at least 1",
            ));
        }
        if self.progress_increment_max > MAX_PROGRESS {
            return Err(ShuttleError::invalid_config(
                "progress_increment_max",
                format!("must be at most {MAX_PROGRESS}"),
            ));
        }
        if self.progress_increment_min > self.progress_increment_max {
            return Err(ShuttleError::invalid_config(
                "progress_increment_min",
                format!(
                    "({}) must not exceed progress_increment_max ({})",
                    self.progress_increment_min, self.progress_increment_max
                ),
            ));
        }
        if self.tick_interval < Duration::from_millis(1) {
            return Err(ShuttleError::invalid_config(
                "tick_interval",
                "must be at least 1ms",
            ));
        }
        if self.broadcast_capacity == 0 {
            return Err(ShuttleError::invalid_config(
                "broadcast_capacity",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Merge `patch` into a copy of `self` and validate the result.
    /// `self` is left untouched when the merged config is invalid.
    pub fn apply(&self, patch: &ConfigPatch) -> Result<Self, ShuttleError> {
        let merged = Self {
            aging_factor_secs: patch.aging_factor_secs.unwrap_or(self.aging_factor_secs),
            progress_increment_min: patch
                .progress_increment_min
                .unwrap_or(self.progress_increment_min),
            progress_increment_max: patch
                .progress_increment_max
                .unwrap_or(self.progress_increment_max),
            tick_interval: patch
                .tick_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(self.tick_interval),
            broadcast_capacity: self.broadcast_capacity,
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Partial update for `QueueConfig` (every field optional).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(alias = "agingFactor")]
    pub aging_factor_secs: Option<u64>,
    pub progress_increment_min: Option<u8>,
    pub progress_increment_max: Option<u8>,
    #[serde(alias = "processingInterval")]
    pub tick_interval_ms: Option<u64>,
}

impl ConfigPatch {
    pub fn aging_factor_secs(mut self, secs: u64) -> Self {
        self.aging_factor_secs = Some(secs);
        self
    }

    pub fn progress_increment(mut self, min: u8, max: u8) -> Self {
        self.progress_increment_min = Some(min);
        self.progress_increment_max = Some(max);
        self
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = Some(ms);
        self
    }
}
