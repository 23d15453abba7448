//! Tests for the command-line interface

use assert_cmd::Command;
use predicates::prelude::*;
use stmgraph::config::Config;
use tempfile::TempDir;

fn stmgraph() -> Command {
    Command::cargo_bin("stmgraph").unwrap()
}

#[test]
fn test_help_lists_commands() {
    stmgraph()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("wizard"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("init-config"))
        .stdout(predicate::str::contains("--bridge"));
}

#[test]
fn test_version() {
    stmgraph()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_init_config_writes_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stmgraph_config.json");

    stmgraph()
        .args(["init-config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Default configuration written"));

    assert_eq!(Config::load(&path).unwrap(), Config::default());
}

#[test]
fn test_init_config_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("existing.json");
    std::fs::write(&path, "{}").unwrap();

    stmgraph()
        .arg("init-config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");

    stmgraph()
        .arg("init-config")
        .arg(&path)
        .arg("--force")
        .assert()
        .success();
    assert_eq!(Config::load(&path).unwrap(), Config::default());
}

#[test]
fn test_run_requires_config() {
    let dir = TempDir::new().unwrap();
    stmgraph()
        .arg("run")
        .arg("--log-file")
        .arg(dir.path().join("stmgraph.log"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("needs a configuration file"));
}

#[test]
fn test_run_reports_unreadable_config() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("broken.json");
    std::fs::write(&config, "{ not json").unwrap();

    stmgraph()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .arg("--log-file")
        .arg(dir.path().join("stmgraph.log"))
        .assert()
        .failure();
}

#[test]
fn test_unknown_subcommand_fails() {
    stmgraph().arg("frobnicate").assert().failure();
}
