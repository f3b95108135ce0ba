use chrono::{FixedOffset, Local, TimeZone, Utc};
use ordo_core::config::{
    dirs_path, parse_cutoff, GlobalConfig, ResolverConfig, UpgradeStrategy, DEFAULT_MAX_ROUNDS,
};
use tempfile::TempDir;

#[test]
fn test_default_max_rounds() {
    let config = ResolverConfig::default();
    assert_eq!(config.max_rounds, 200_000);
    assert_eq!(config.max_rounds, DEFAULT_MAX_ROUNDS);
}

#[test]
fn test_default_strategy_never_upgrades() {
    let config = ResolverConfig::default();
    assert_eq!(config.upgrade_strategy, UpgradeStrategy::ToSatisfyOnly);
    assert!(!config.ignore_dependencies);
    assert!(!config.pre);
}

#[test]
fn test_empty_toml_uses_defaults() {
    let config = GlobalConfig::parse_toml("").unwrap();
    assert_eq!(config.resolver, ResolverConfig::default());
}

#[test]
fn test_parse_resolver_table() {
    let toml = r#"
[resolver]
upgrade-strategy = "only-if-needed"
max-rounds = 5000
ignore-dependencies = true
pre = true
python-version = "3.11"
"#;
    let config = GlobalConfig::parse_toml(toml).unwrap();
    assert_eq!(config.resolver.upgrade_strategy, UpgradeStrategy::OnlyIfNeeded);
    assert_eq!(config.resolver.max_rounds, 5000);
    assert!(config.resolver.ignore_dependencies);
    assert!(config.resolver.pre);
    assert_eq!(config.resolver.python_version.as_deref(), Some("3.11"));
}

#[test]
fn test_invalid_strategy_is_config_error() {
    let err = GlobalConfig::parse_toml("[resolver]\nupgrade-strategy = \"sometimes\"\n").unwrap_err();
    assert!(err.to_string().contains("Configuration error"), "got: {err}");
}

#[test]
fn test_strategy_from_name_is_lenient() {
    assert_eq!(UpgradeStrategy::from_name("eager"), UpgradeStrategy::Eager);
    assert_eq!(
        UpgradeStrategy::from_name("only-if-needed"),
        UpgradeStrategy::OnlyIfNeeded
    );
    assert_eq!(
        UpgradeStrategy::from_name("whatever"),
        UpgradeStrategy::ToSatisfyOnly
    );
    assert_eq!(UpgradeStrategy::Eager.to_string(), "eager");
}

#[test]
fn test_load_from_missing_file_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = GlobalConfig::load_from(&tmp.path().join("config.toml")).unwrap();
    assert_eq!(config.resolver.max_rounds, DEFAULT_MAX_ROUNDS);
}

#[test]
fn test_load_from_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(&path, "[resolver]\nmax-rounds = 42\n").unwrap();
    let config = GlobalConfig::load_from(&path).unwrap();
    assert_eq!(config.resolver.max_rounds, 42);
}

#[test]
fn test_dirs_path_contains_ordo() {
    let path = dirs_path();
    assert!(path.ends_with(".ordo"));
}

#[test]
fn test_cutoff_with_offset_is_exact() {
    assert_eq!(
        parse_cutoff("2023-01-01T00:00:00+00:00").unwrap(),
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
    );
    let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
    assert_eq!(
        parse_cutoff("2023-01-01T12:00:00-05:00").unwrap(),
        minus_five
            .with_ymd_and_hms(2023, 1, 1, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    );
    assert_eq!(
        parse_cutoff("2023-01-01T17:00:00Z").unwrap(),
        Utc.with_ymd_and_hms(2023, 1, 1, 17, 0, 0).unwrap()
    );
}

#[test]
fn test_naive_cutoff_uses_local_time() {
    let local = |y, mo, d, h, mi, s| {
        Local
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    };
    assert_eq!(
        parse_cutoff("2023-01-01T00:00:00").unwrap(),
        local(2023, 1, 1, 0, 0, 0)
    );
    assert_eq!(
        parse_cutoff("2023-12-31T23:59:59").unwrap(),
        local(2023, 12, 31, 23, 59, 59)
    );
    assert_eq!(parse_cutoff("2023-01-01").unwrap(), local(2023, 1, 1, 0, 0, 0));
}

#[test]
fn test_invalid_cutoffs_rejected() {
    for value in ["not-a-date", "2023-13-01", "2023-01-32", "2023-01-01T25:00:00", ""] {
        let err = parse_cutoff(value).unwrap_err();
        assert!(err.to_string().contains("Invalid date"), "{value}: {err}");
    }
}

#[test]
fn test_exclude_newer_than_in_config() {
    let config = GlobalConfig::parse_toml("[resolver]\nexclude-newer-than = \"2023-01-01T00:00:00Z\"\n")
        .unwrap()
        .resolver;
    assert_eq!(
        config.upload_cutoff().unwrap(),
        Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
    );

    let alias = GlobalConfig::parse_toml("[resolver]\nuploaded-prior-to = \"2023-01-01T00:00:00Z\"\n")
        .unwrap()
        .resolver;
    assert_eq!(alias.exclude_newer_than, config.exclude_newer_than);

    assert_eq!(ResolverConfig::default().upload_cutoff().unwrap(), None);
    let bad = ResolverConfig {
        exclude_newer_than: Some("yesterday".to_string()),
        ..ResolverConfig::default()
    };
    assert!(bad.upload_cutoff().is_err());
}
