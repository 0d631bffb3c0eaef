use super::*;
use serial_test::serial;

fn clear_env() {
    for name in [
        PROFILE_ENV,
        TELEMETRY_ENABLED_ENV,
        MAX_BATCH_SIZE_ENV,
        BATCH_INTERVAL_ENV,
    ] {
        unsafe { env::remove_var(name) };
    }
}

#[test]
fn defaults_match_documented_values() {
    let config = ChannelConfig::default();
    assert!(config.enabled);
    assert_eq!(config.max_batch_size, 50);
    assert_eq!(config.batch_interval_secs, 15);
    assert_eq!(config.batch_interval(), Duration::from_secs(15));
    assert_eq!(config.timer_mode, TimerMode::RestartOnFlush);
    assert!(config.validate().is_ok());
}

#[test]
fn profiles_only_change_batch_size() {
    let cases = [
        (Profile::Strict, 5),
        (Profile::Standard, 50),
        (Profile::Debug, 150),
    ];

    for (profile, expected) in cases {
        let config = ChannelConfig::with_profile(profile);
        assert_eq!(config.max_batch_size, expected, "{profile:?}");
        assert_eq!(config.batch_interval_secs, DEFAULT_BATCH_INTERVAL_SECS);
    }
}

#[test]
fn profile_parsing_is_case_insensitive() {
    assert_eq!("STRICT".parse::<Profile>(), Ok(Profile::Strict));
    assert_eq!("Debug".parse::<Profile>(), Ok(Profile::Debug));
    assert_eq!("default".parse::<Profile>(), Ok(Profile::Standard));
    assert_eq!(
        "turbo".parse::<Profile>(),
        Err(ConfigError::UnknownProfile("turbo".into()))
    );
}

#[test]
fn validate_rejects_zero_thresholds() {
    let zero_size = ChannelConfig {
        max_batch_size: 0,
        ..ChannelConfig::default()
    };
    assert_eq!(zero_size.validate(), Err(ConfigError::ZeroBatchSize));

    let zero_interval = ChannelConfig {
        batch_interval_secs: 0,
        ..ChannelConfig::default()
    };
    assert_eq!(zero_interval.validate(), Err(ConfigError::ZeroInterval));

    // Below the recommendation is only a warning.
    let tiny = ChannelConfig {
        max_batch_size: 1,
        ..ChannelConfig::default()
    };
    assert!(tiny.validate().is_ok());
}

#[test]
#[serial]
fn from_env_applies_overrides() {
    clear_env();
    unsafe {
        env::set_var(PROFILE_ENV, "debug");
        env::set_var(BATCH_INTERVAL_ENV, " 3 ");
        env::set_var(TELEMETRY_ENABLED_ENV, "false");
    }

    let config = ChannelConfig::from_env();
    assert_eq!(config.max_batch_size, 150);
    assert_eq!(config.batch_interval_secs, 3);
    assert!(!config.enabled);

    unsafe { env::set_var(MAX_BATCH_SIZE_ENV, "20") };
    assert_eq!(ChannelConfig::from_env().max_batch_size, 20);

    clear_env();
}

#[test]
#[serial]
fn from_env_ignores_garbage() {
    clear_env();
    unsafe {
        env::set_var(PROFILE_ENV, "turbo");
        env::set_var(MAX_BATCH_SIZE_ENV, "lots");
        env::set_var(BATCH_INTERVAL_ENV, "-1");
    }

    assert_eq!(ChannelConfig::from_env(), ChannelConfig::default());

    clear_env();
}
