use std::{env, path::PathBuf};

pub const PROGRAM_NAME: &str = "pulse";
pub const PROGRAM_LOG_LEVEL: &str = "PULSE_LOG_LEVEL";
/// When set, log lines are appended to this file instead of stderr.
pub const PROGRAM_LOG_FILE: &str = "PULSE_LOG_FILE";

/// `0` or `false` disables the telemetry channel.
pub const TELEMETRY_ENABLED_ENV: &str = "PULSE_TELEMETRY";
pub const PROFILE_ENV: &str = "PULSE_PROFILE";
pub const MAX_BATCH_SIZE_ENV: &str = "PULSE_MAX_BATCH_SIZE";
pub const BATCH_INTERVAL_ENV: &str = "PULSE_BATCH_INTERVAL";
pub const STORE_DIR_ENV: &str = "PULSE_STORE_DIR";

const STORE_DIR_NAME: &str = "batches";

pub fn xdg_or_home(xdg_var: &str, home_suffix: &str) -> PathBuf {
    if let Some(dir) = env::var_os(xdg_var) {
        PathBuf::from(dir)
    } else {
        env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(home_suffix)
    }
}

/// Per-user state directory for the program, e.g. `~/.local/state/pulse`.
pub fn state_dir() -> Option<PathBuf> {
    // Check XDG_STATE_HOME first (Linux)
    if let Ok(xdg_state) = env::var("XDG_STATE_HOME")
        && !xdg_state.is_empty()
    {
        return Some(PathBuf::from(xdg_state).join(PROGRAM_NAME));
    }

    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|p| p.join(PROGRAM_NAME))
}

/// Directory holding persisted batches that could not be delivered.
pub fn default_store_dir() -> PathBuf {
    if let Some(dir) = env::var_os(STORE_DIR_ENV)
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }

    state_dir()
        .unwrap_or_else(|| xdg_or_home("XDG_CACHE_HOME", ".cache").join(PROGRAM_NAME))
        .join(STORE_DIR_NAME)
}

/// Interprets a boolean-ish env value. Unset means `default`.
pub fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(val) if val == "0" || val.eq_ignore_ascii_case("false") => false,
        Ok(val) if val == "1" || val.eq_ignore_ascii_case("true") => true,
        _ => default,
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
