use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

/// A feedwatch command isolated in a temp dir with an offline setup
fn feedwatch(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("feedwatch");
    cmd.current_dir(dir.path())
        .env("FEEDWATCH__GENERAL__STATE_DB_PATH", dir.path().join("state.sqlite"))
        .env("FEEDWATCH__GENERAL__OUTBOX_PATH", dir.path().join("outbox.jsonl"))
        .env("FEEDWATCH__CLASSIFIER__PROVIDER", "stub")
        .env("FEEDWATCH__TELEGRAM__TOKEN_ENV", "FEEDWATCH_TEST_TOKEN_NEVER_SET");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().expect("temp dir");

    feedwatch(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("subscribers"));
}

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");

    feedwatch(&dir)
        .args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("history_cap = 50"));
    assert!(content.contains("send_cap = 3"));

    feedwatch(&dir)
        .args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn missing_explicit_config_fails() {
    let dir = TempDir::new().expect("temp dir");

    feedwatch(&dir)
        .args(["--config", "nope.toml", "subscribers", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn subscribers_add_link_and_list() {
    let dir = TempDir::new().expect("temp dir");

    feedwatch(&dir)
        .args(["subscribers", "add", "u1", "--keyword", "gold", "--keyword", "bist"])
        .assert()
        .success();
    feedwatch(&dir)
        .args(["subscribers", "add", "u2", "--follow", "@alice"])
        .assert()
        .success();
    feedwatch(&dir)
        .args(["subscribers", "link", "u1", "4242"])
        .assert()
        .success();

    let output = feedwatch(&dir)
        .args(["subscribers", "list", "--json"])
        .output()
        .expect("run list");
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let subscribers = value.as_array().expect("array");
    assert_eq!(subscribers.len(), 2);
    assert_eq!(subscribers[0]["id"], "u1");
    assert_eq!(subscribers[0]["delivery_target"], "4242");
    assert_eq!(subscribers[0]["watch"]["keywords"][0], "gold");
    assert_eq!(subscribers[1]["watch"]["follow"]["subject"], "alice");
}

#[test]
fn subscribers_add_requires_a_watch() {
    let dir = TempDir::new().expect("temp dir");

    feedwatch(&dir)
        .args(["subscribers", "add", "u1"])
        .assert()
        .failure();
}

#[test]
fn dry_run_without_feeds_reports_no_data() {
    let dir = TempDir::new().expect("temp dir");

    feedwatch(&dir)
        .args(["subscribers", "add", "u1", "--keyword", "gold"])
        .assert()
        .success();

    let output = feedwatch(&dir)
        .args(["run", "--once", "--dry-run"])
        .output()
        .expect("run once");
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(report["success"], true);
    assert_eq!(report["status"], "no_data");
    assert_eq!(report["subscribers"], Value::Array(vec![]));
}

#[test]
fn run_without_bot_token_fails() {
    let dir = TempDir::new().expect("temp dir");

    feedwatch(&dir)
        .args(["run", "--once"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FEEDWATCH_TEST_TOKEN_NEVER_SET"));
}

#[test]
fn doctor_reports_json() {
    let dir = TempDir::new().expect("temp dir");

    let output = feedwatch(&dir)
        .args(["doctor", "--json"])
        .output()
        .expect("run doctor");
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(report["config"]["status"], "ok");
    assert_eq!(report["store"]["status"], "ok");
    assert_eq!(report["news"]["status"], "warn");
    assert_eq!(report["overall"], "warn");
}
