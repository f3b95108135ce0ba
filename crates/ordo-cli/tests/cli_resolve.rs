use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const INDEX: &str = r#"
[[package]]
name = "complex-pkg"
version = "1.0"
dependencies = ["dep-a", "dep-b"]

[[package]]
name = "dep-a"
version = "1.0"
dependencies = ["dep-b"]

[[package]]
name = "dep-b"
version = "1.0"
dependencies = ["dep-a"]

[[package]]
name = "app"
version = "1.0"
dependencies = ["lib"]

[[package]]
name = "lib"
version = "1.0"
upload-time = "2022-06-01T00:00:00Z"

[[package]]
name = "lib"
version = "2.0"
upload-time = "2024-06-01T00:00:00Z"

[[package]]
name = "broken"
version = "0.1"
dependencies = ["lib<0.1"]
"#;

/// A temp dir holding `ordo-index.toml`, with `HOME` pointed inside it so
/// no user config leaks into the run.
fn workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("ordo-index.toml"), INDEX).unwrap();
    tmp
}

fn ordo_cmd(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ordo").unwrap();
    cmd.current_dir(tmp.path())
        .env("HOME", tmp.path())
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_resolve_prints_installation_order() {
    let tmp = workspace();

    ordo_cmd(&tmp)
        .args(["resolve", "app"])
        .assert()
        .success()
        .stdout("lib==2.0\napp==1.0\n");
}

#[test]
fn test_resolve_finds_index_in_parent_directory() {
    let tmp = workspace();
    let nested = tmp.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();

    let mut cmd = ordo_cmd(&tmp);
    cmd.current_dir(&nested)
        .args(["resolve", "lib<2"])
        .assert()
        .success()
        .stdout("lib==1.0\n");
}

#[test]
fn test_resolve_cycle_with_default_budget() {
    let tmp = workspace();

    ordo_cmd(&tmp)
        .args(["resolve", "complex-pkg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dep-a==1.0"))
        .stdout(predicate::str::contains("dep-b==1.0"))
        .stdout(predicate::str::ends_with("complex-pkg==1.0\n"));
}

#[test]
fn test_resolve_too_deep_fails() {
    let tmp = workspace();

    ordo_cmd(&tmp)
        .args(["resolve", "complex-pkg", "--max-resolution-rounds", "1"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Resolution too deep"));
}

#[test]
fn test_resolve_impossible_fails() {
    let tmp = workspace();

    ordo_cmd(&tmp)
        .args(["resolve", "broken"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Dependency resolution failed"))
        .stderr(predicate::str::contains("lib<0.1"));
}

#[test]
fn test_resolve_constraint_and_installed() {
    let tmp = workspace();

    ordo_cmd(&tmp)
        .args(["resolve", "app", "--constraint", "lib<2"])
        .assert()
        .success()
        .stdout("lib==1.0\napp==1.0\n");

    ordo_cmd(&tmp)
        .args(["resolve", "app", "--installed", "lib==1.0"])
        .assert()
        .success()
        .stdout("lib==1.0\napp==1.0\n");

    ordo_cmd(&tmp)
        .args([
            "resolve",
            "app",
            "--installed",
            "lib==1.0",
            "--upgrade-strategy",
            "eager",
        ])
        .assert()
        .success()
        .stdout("lib==2.0\napp==1.0\n");
}

#[test]
fn test_resolve_no_deps() {
    let tmp = workspace();

    ordo_cmd(&tmp)
        .args(["resolve", "app", "--no-deps"])
        .assert()
        .success()
        .stdout("app==1.0\n");
}

#[test]
fn test_resolve_json_format() {
    let tmp = workspace();

    let output = ordo_cmd(&tmp)
        .args(["resolve", "app", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["packages"][0]["name"], "lib");
    assert_eq!(json["packages"][1]["name"], "app");
    assert_eq!(json["packages"][1]["dependencies"][0], "lib");
}

#[test]
fn test_resolve_config_file_sets_budget() {
    let tmp = workspace();
    let config = tmp.path().join("config.toml");
    fs::write(&config, "[resolver]\nmax-rounds = 1\n").unwrap();

    ordo_cmd(&tmp)
        .args(["resolve", "complex-pkg", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Resolution too deep"));

    ordo_cmd(&tmp)
        .args(["resolve", "complex-pkg", "--max-resolution-rounds", "100", "--config"])
        .arg(&config)
        .assert()
        .success();
}

#[test]
fn test_resolve_without_index_fails() {
    let tmp = TempDir::new().unwrap();

    ordo_cmd(&tmp)
        .args(["resolve", "app"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ordo-index.toml"));
}

#[test]
fn test_resolve_rejects_bad_installed_flag() {
    let tmp = workspace();

    ordo_cmd(&tmp)
        .args(["resolve", "app", "--installed", "lib"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected name==version"));
}

#[test]
fn test_resolve_requires_requirements() {
    let tmp = workspace();

    ordo_cmd(&tmp).args(["resolve"]).assert().failure();
}

#[test]
fn test_resolve_exclude_newer_than() {
    let tmp = workspace();

    ordo_cmd(&tmp)
        .args(["resolve", "app", "--exclude-newer-than", "2023-01-01T00:00:00+00:00"])
        .assert()
        .success()
        .stdout("lib==1.0\napp==1.0\n");

    ordo_cmd(&tmp)
        .args(["resolve", "app", "--uploaded-prior-to", "2025-01-01"])
        .assert()
        .success()
        .stdout("lib==2.0\napp==1.0\n");
}

#[test]
fn test_resolve_rejects_invalid_cutoff_date() {
    let tmp = workspace();

    ordo_cmd(&tmp)
        .args(["resolve", "app", "--exclude-newer-than", "2023-13-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date"));
}
