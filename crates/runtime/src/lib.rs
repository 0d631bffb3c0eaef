mod config;
pub mod logging;

pub use config::{
    BATCH_INTERVAL_ENV, MAX_BATCH_SIZE_ENV, PROFILE_ENV, PROGRAM_NAME, STORE_DIR_ENV,
    TELEMETRY_ENABLED_ENV, default_store_dir, env_flag, state_dir,
};

pub use logging::init;
