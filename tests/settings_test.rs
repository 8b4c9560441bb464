use std::time::Duration;

use report_loader::config::{KEY_BASE_URL, KEY_MIN_DURATION_MS, LoaderConfig, Settings};

#[test]
fn settings_persist_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings-test.db");
    let path_str = path.to_str().unwrap();

    {
        let settings = Settings::open(path_str).unwrap();
        settings.set(KEY_BASE_URL, "http://reports.example").unwrap();
        settings.set(KEY_MIN_DURATION_MS, "1500").unwrap();
    }

    let settings = Settings::open(path_str).unwrap();
    assert_eq!(settings.base_url().unwrap(), "http://reports.example");

    let mut config = LoaderConfig::default();
    settings.apply(&mut config).unwrap();
    assert_eq!(config.min_duration, Duration::from_millis(1500));
}

#[test]
fn removed_keys_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings-test.db");
    let settings = Settings::open(path.to_str().unwrap()).unwrap();

    settings.set(KEY_MIN_DURATION_MS, "10").unwrap();
    settings.remove(KEY_MIN_DURATION_MS).unwrap();

    let mut config = LoaderConfig::default();
    settings.apply(&mut config).unwrap();
    assert_eq!(config.min_duration, LoaderConfig::default().min_duration);
}
