use std::env;
use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::load_config;
use super::settings::Settings;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.broker.first_id, 1);
    assert_eq!(settings.broker.max_sessions, 1000);
    assert_eq!(settings.logging.level, "info");
}

/// Runs `f` with a fresh temporary directory as the working directory.
fn in_temp_dir<T>(f: impl FnOnce(&TempDir) -> T) -> T {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");
    let result = f(&tmp);
    env::set_current_dir(orig).expect("restore cwd");
    result
}

#[test]
#[serial]
fn load_config_without_sources_uses_defaults() {
    let cfg = in_temp_dir(|_| load_config().expect("load_config failed"));
    assert_eq!(cfg, Settings::default());
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let cfg = in_temp_dir(|_| {
        fs::create_dir_all("config").expect("create config dir");
        let toml = r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [broker]
            first_id = 100
        "#;
        fs::write("config/default.toml", toml).expect("write config file");
        load_config().expect("load_config failed")
    });

    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.broker.first_id, 100);
    // untouched keys keep their defaults
    assert_eq!(cfg.broker.max_sessions, 1000);
    assert_eq!(cfg.logging.level, "info");
}

#[test]
#[serial]
fn load_config_environment_overrides_file() {
    let cfg = in_temp_dir(|_| {
        fs::create_dir_all("config").expect("create config dir");
        fs::write("config/default.toml", "[server]\nport = 9000\n").expect("write config file");

        temp_env::with_vars(
            [
                ("WAMPSUB__SERVER__PORT", Some("9100")),
                ("WAMPSUB__BROKER__MAX_SESSIONS", Some("5")),
                ("WAMPSUB__LOGGING__LEVEL", Some("debug")),
            ],
            || load_config().expect("load_config failed"),
        )
    });

    assert_eq!(cfg.server.port, 9100);
    assert_eq!(cfg.broker.max_sessions, 5);
    assert_eq!(cfg.logging.level, "debug");
}
