use std::fs;

use tally_config::{Backend, Config, ConfigError, ConfigManager};
use tally_domain::Role;
use tempfile::tempdir;

#[test]
fn missing_file_loads_defaults() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::in_dir(dir.path());

    let cfg = manager.load().expect("load defaults");

    assert_eq!(cfg, Config::default());
    assert_eq!(cfg.currency, "USD");
    assert_eq!(cfg.invoice_prefix, "EXP");
    assert_eq!(cfg.backend, Backend::Sqlite);
    assert_eq!(cfg.max_cycles_per_definition, 10_000);
}

#[test]
fn saved_config_round_trips() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::in_dir(dir.path());
    let cfg = Config {
        currency: "EUR".into(),
        lookahead_days: 7,
        backend: Backend::Json,
        data_root: Some(dir.path().join("data")),
        operator_role: Role::System,
        ..Config::default()
    };

    manager.save(&cfg).expect("save");

    assert!(manager.config_path().exists());
    assert_eq!(manager.load().expect("load"), cfg);
}

#[test]
fn partial_file_fills_in_defaults() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::in_dir(dir.path());
    fs::write(
        manager.config_path(),
        r#"{ "invoice_prefix": "RC", "operator_role": "support" }"#,
    )
    .expect("write");

    let cfg = manager.load().expect("load");

    assert_eq!(cfg.invoice_prefix, "RC");
    assert_eq!(cfg.operator_role, Role::Support);
    assert_eq!(cfg.currency, "USD");
}

#[test]
fn invalid_values_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::in_dir(dir.path());
    let cfg = Config {
        currency: "dollars".into(),
        ..Config::default()
    };

    let err = manager.save(&cfg).expect_err("currency must be three letters");

    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(!manager.config_path().exists());
}

#[test]
fn backups_are_listed_and_restored() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::in_dir(dir.path()).with_retention(2);
    let original = Config {
        currency: "GBP".into(),
        ..Config::default()
    };
    manager.save(&original).expect("save");

    let name = manager
        .backup(&original, Some("Before upgrade"))
        .expect("backup");
    assert!(name.starts_with("config_"));
    assert!(name.ends_with("_before-upgrade.json"));

    manager
        .save(&Config {
            currency: "JPY".into(),
            ..Config::default()
        })
        .expect("overwrite");

    assert_eq!(manager.list_backups().expect("list"), vec![name.clone()]);
    let restored = manager.restore(&name).expect("restore");
    assert_eq!(restored.currency, "GBP");
    assert_eq!(manager.load().expect("reload").currency, "GBP");

    assert!(matches!(
        manager.restore("config_19990101_0000.json"),
        Err(ConfigError::BackupNotFound(_))
    ));
}

#[test]
fn unset_data_root_resolves_under_platform_dir() {
    let cfg = Config::default();
    assert!(cfg.resolve_data_root().ends_with("tally"));
    assert!(cfg.operator().is_nil());
}
