use super::*;
use serial_test::serial;

#[test]
#[serial]
fn store_dir_env_override_wins() {
    unsafe { env::set_var(STORE_DIR_ENV, "/tmp/pulse-store-override") };
    assert_eq!(
        default_store_dir(),
        PathBuf::from("/tmp/pulse-store-override")
    );
    unsafe { env::remove_var(STORE_DIR_ENV) };
}

#[test]
#[serial]
fn store_dir_falls_back_to_xdg_state() {
    unsafe {
        env::remove_var(STORE_DIR_ENV);
        env::set_var("XDG_STATE_HOME", "/tmp/xdg-state");
    }

    assert_eq!(
        default_store_dir(),
        PathBuf::from("/tmp/xdg-state/pulse/batches")
    );

    unsafe { env::remove_var("XDG_STATE_HOME") };
}

#[test]
#[serial]
fn empty_store_dir_env_is_ignored() {
    unsafe {
        env::set_var(STORE_DIR_ENV, "");
        env::set_var("XDG_STATE_HOME", "/tmp/xdg-state");
    }

    assert_eq!(
        default_store_dir(),
        PathBuf::from("/tmp/xdg-state/pulse/batches")
    );

    unsafe {
        env::remove_var(STORE_DIR_ENV);
        env::remove_var("XDG_STATE_HOME");
    }
}

#[test]
#[serial]
fn env_flag_parses_cases() {
    const VAR: &str = "PULSE_TEST_FLAG";

    let cases: &[(Option<&str>, bool, bool)] = &[
        (None, true, true),
        (None, false, false),
        (Some("0"), true, false),
        (Some("false"), true, false),
        (Some("FALSE"), true, false),
        (Some("1"), false, true),
        (Some("True"), false, true),
        (Some("maybe"), true, true),
        (Some("maybe"), false, false),
    ];

    for (value, default, expected) in cases {
        match value {
            Some(v) => unsafe { env::set_var(VAR, v) },
            None => unsafe { env::remove_var(VAR) },
        }

        assert_eq!(
            env_flag(VAR, *default),
            *expected,
            "env {:?} with default {} should yield {}",
            value,
            default,
            expected
        );
    }

    unsafe { env::remove_var(VAR) };
}
