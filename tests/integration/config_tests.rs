use figment::providers::{Format, Serialized, Toml};
use pcapcache::config::Config;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = figment::Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert!(config.enabled);
    assert_eq!(config.max_age_days, 30);
    assert_eq!(config.store_path, None);
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
enabled = false
store_path = "/var/cache/pcap/analysis.db"
max_age_days = 7
"#;
    fs::write(&config_path, toml_content).unwrap();

    let config = Config::load_from(&config_path).unwrap();
    assert!(!config.enabled);
    assert_eq!(
        config.store_path,
        Some(PathBuf::from("/var/cache/pcap/analysis.db"))
    );
    assert_eq!(config.max_age_days, 7);
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let temp_dir = tempdir().unwrap();
    let config = Config::load_from(&temp_dir.path().join("absent.toml")).unwrap();
    assert!(config.enabled);
    assert_eq!(config.max_age_days, 30);
}

#[test]
fn test_config_invalid_toml_is_an_error() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "max_age_days = \"forever\"").unwrap();

    let err = Config::load_from(&config_path).unwrap_err();
    assert!(format!("{:#}", err).contains("Invalid configuration"));
}

#[test]
fn test_config_env_overrides_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "compact_after_evict = false\n").unwrap();

    std::env::set_var("PCAPCACHE_COMPACT_AFTER_EVICT", "true");
    let config: Config = Config::figment(&config_path).extract().unwrap();
    std::env::remove_var("PCAPCACHE_COMPACT_AFTER_EVICT");

    assert!(config.compact_after_evict);
}

#[test]
fn test_config_save_round_trip() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let config = Config {
        enabled: true,
        store_path: Some(temp_dir.path().join("store.db")),
        max_age_days: 90,
        compact_after_evict: true,
    };
    config.save(&config_path).unwrap();

    let figment = figment::Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path));
    let loaded: Config = figment.extract().unwrap();
    assert_eq!(loaded, config);
}
