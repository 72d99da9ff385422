// domain-watch/tests/cli_integration.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::{Builder, NamedTempFile, TempDir};

const STATE_RECORD: &str = r#"{
  "expiration": "2027-08-13T04:00:00Z",
  "notified_expiry": false,
  "notified_available": false
}"#;

/// Command with none of the configuration variables inherited from the shell
fn watch_cmd() -> Command {
    let mut cmd = Command::cargo_bin("domain-watch").unwrap();
    for var in [
        "DOMAINS",
        "THRESHOLD_DAYS",
        "STATE_DIR",
        "RETRIES",
        "BACKOFF",
        "CONCURRENCY",
        "TIMEOUT",
        "NOTIFY_COMMAND",
        "NAMESERVER",
        "CONFIG_FILE",
        "DEBUG",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Helper to create a config file with the given suffix
fn create_config_file(suffix: &str, content: &str) -> NamedTempFile {
    let file = Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    fs::write(file.path(), content).expect("Failed to write to temp file");
    file
}

#[test]
fn test_help_lists_flags() {
    let mut cmd = watch_cmd();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--threshold-days"))
        .stdout(predicate::str::contains("--state-dir"))
        .stdout(predicate::str::contains("--notify-command"))
        .stdout(predicate::str::contains("--print-config"));
}

#[test]
fn test_print_config_defaults_and_flags() {
    let mut cmd = watch_cmd();
    cmd.args([
        "example.com",
        "--print-config",
        "--state-dir",
        "/tmp/domain-watch-state",
        "-c",
        "3",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"example.com\""))
        .stdout(predicate::str::contains("\"concurrency\": 3"))
        .stdout(predicate::str::contains("\"threshold_days\": 7"))
        .stdout(predicate::str::contains("\"backoff\": \"2s\""))
        .stdout(predicate::str::contains("/tmp/domain-watch-state"));
}

#[test]
fn test_env_overrides_config_file() {
    let config = create_config_file(
        ".json",
        r#"{"domains":["example.org"],"threshold_days":14,"timeout":3000000000}"#,
    );

    let mut cmd = watch_cmd();
    cmd.env("THRESHOLD_DAYS", "21")
        .env("CONFIG_FILE", config.path())
        .arg("--print-config");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"threshold_days\": 21"))
        .stdout(predicate::str::contains("\"timeout\": \"3s\""))
        .stdout(predicate::str::contains("\"example.org\""));
}

#[test]
fn test_toml_config_file_flag() {
    let config = create_config_file(".toml", "retries = 6\nbackoff = \"750ms\"\n");

    let mut cmd = watch_cmd();
    cmd.arg("--config").arg(config.path()).arg("--print-config");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"retries\": 6"))
        .stdout(predicate::str::contains("\"backoff\": \"750ms\""));
}

#[test]
fn test_invalid_config_file_fails() {
    let config = create_config_file(".toml", "concurrency = 0\n");

    let mut cmd = watch_cmd();
    cmd.arg("--config").arg(config.path()).arg("--print-config");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Concurrency must be between 1 and 100"));
}

#[test]
fn test_missing_config_file_fails() {
    let mut cmd = watch_cmd();
    cmd.args(["--config", "/nonexistent/domain-watch.toml", "--print-config"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_invalid_timeout_flag_fails() {
    let mut cmd = watch_cmd();
    cmd.args(["--timeout", "soon", "--print-config"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid --timeout"));
}

#[test]
fn test_run_without_domains_prunes_stale_state() {
    let state_dir = TempDir::new().unwrap();
    let stale = state_dir.path().join("old_example_com.json");
    let foreign = state_dir.path().join("settings.json");
    let notes = state_dir.path().join("notes.txt");
    fs::write(&stale, STATE_RECORD).unwrap();
    fs::write(&foreign, r#"{"theme":"dark"}"#).unwrap();
    fs::write(&notes, STATE_RECORD).unwrap();

    let mut cmd = watch_cmd();
    cmd.arg("--state-dir").arg(state_dir.path());

    cmd.assert().success();

    assert!(!stale.exists());
    assert!(foreign.exists());
    assert!(notes.exists());
}

#[test]
fn test_cli_domains_keep_other_state() {
    let state_dir = TempDir::new().unwrap();
    let configured = state_dir.path().join("configured_example.json");
    fs::write(&configured, STATE_RECORD).unwrap();

    // An unencodable name fails before any query is sent
    let mut cmd = watch_cmd();
    cmd.arg("bad..example").arg("--state-dir").arg(state_dir.path());

    cmd.assert().success();
    assert!(configured.exists());
}

#[test]
fn test_run_creates_missing_state_dir() {
    let parent = TempDir::new().unwrap();
    let state_dir = parent.path().join("nested").join("state");

    let mut cmd = watch_cmd();
    cmd.arg("--state-dir").arg(&state_dir);

    cmd.assert().success();
    assert!(state_dir.is_dir());
}

#[test]
fn test_uncreatable_state_dir_is_fatal() {
    let blocker = NamedTempFile::new().unwrap();
    let state_dir = blocker.path().join("state");

    let mut cmd = watch_cmd();
    cmd.arg("--state-dir").arg(&state_dir);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to create state directory"));
}
