use std::{env, str::FromStr, time::Duration};

use log::warn;
use pulse_runtime::{
    BATCH_INTERVAL_ENV, MAX_BATCH_SIZE_ENV, PROFILE_ENV, TELEMETRY_ENABLED_ENV, env_flag,
};

use crate::{error::ConfigError, trigger::TimerMode};

pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;
pub const DEFAULT_BATCH_INTERVAL_SECS: u64 = 15;
/// Smaller batches are allowed but defeat the purpose of batching.
pub const RECOMMENDED_MIN_BATCH_SIZE: usize = 5;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Batch size presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Profile {
    /// Small batches, delivered quickly.
    Strict,
    #[default]
    Standard,
    /// Large batches for local debugging.
    Debug,
}

impl Profile {
    pub fn max_batch_size(self) -> usize {
        match self {
            Profile::Strict => 5,
            Profile::Standard => DEFAULT_MAX_BATCH_SIZE,
            Profile::Debug => 150,
        }
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" | "release" => Ok(Profile::Strict),
            "standard" | "default" => Ok(Profile::Standard),
            "debug" => Ok(Profile::Debug),
            _ => Err(ConfigError::UnknownProfile(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub enabled: bool,
    pub max_batch_size: usize,
    pub batch_interval_secs: u64,
    pub timer_mode: TimerMode,
    /// Upper bound on how long shutdown waits for an in-flight flush.
    pub shutdown_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            batch_interval_secs: DEFAULT_BATCH_INTERVAL_SECS,
            timer_mode: TimerMode::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ChannelConfig {
    pub fn with_profile(profile: Profile) -> Self {
        Self {
            max_batch_size: profile.max_batch_size(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `PULSE_*` environment variables. Values that
    /// fail to parse are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = match env::var(PROFILE_ENV) {
            Ok(raw) => match raw.parse::<Profile>() {
                Ok(profile) => Self::with_profile(profile),
                Err(e) => {
                    warn!("ignoring {PROFILE_ENV}: {e}");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };

        config.enabled = env_flag(TELEMETRY_ENABLED_ENV, true);

        if let Some(size) = parse_env::<usize>(MAX_BATCH_SIZE_ENV) {
            config.max_batch_size = size;
        }
        if let Some(secs) = parse_env::<u64>(BATCH_INTERVAL_ENV) {
            config.batch_interval_secs = secs;
        }

        config
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_secs(self.batch_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_thresholds(self.max_batch_size, self.batch_interval_secs)
    }
}

pub(crate) fn validate_thresholds(
    max_batch_size: usize,
    batch_interval_secs: u64,
) -> Result<(), ConfigError> {
    if max_batch_size == 0 {
        return Err(ConfigError::ZeroBatchSize);
    }
    if batch_interval_secs == 0 {
        return Err(ConfigError::ZeroInterval);
    }
    if max_batch_size < RECOMMENDED_MIN_BATCH_SIZE {
        warn!(
            "max batch size {max_batch_size} is below the recommended minimum of {RECOMMENDED_MIN_BATCH_SIZE}"
        );
    }
    Ok(())
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring {name}={raw:?}: not a valid number");
            None
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
