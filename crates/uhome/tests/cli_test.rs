//! Integration tests for the `uhome` CLI binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! and error handling -- all without requiring cloud credentials.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `uhome` binary with env isolation.
///
/// Clears all `UHOME_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn uhome_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("uhome");
    cmd.env("HOME", "/tmp/uhome-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/uhome-cli-test-nonexistent")
        .env_remove("UHOME_PROFILE")
        .env_remove("UHOME_OUTPUT")
        .env_remove("UHOME_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = uhome_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(
        text.contains("Usage"),
        "Expected 'Usage' in output:\n{text}"
    );
}

#[test]
fn test_help_flag() {
    uhome_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("U-home")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("lock"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    uhome_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("uhome"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    uhome_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    uhome_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Error handling ──────────────────────────────────────────────────

#[test]
fn test_devices_without_profile_fails_with_usage_code() {
    let output = uhome_cmd().args(["devices", "list"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(
        text.contains("No profile"),
        "Expected profile error in output:\n{text}"
    );
}

#[test]
fn test_lock_requires_device_id() {
    uhome_cmd().arg("lock").assert().failure();
}

#[test]
fn test_config_show_succeeds_without_config_file() {
    uhome_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default_profile"));
}

#[test]
fn test_auth_status_without_login_fails() {
    let output = uhome_cmd().args(["auth", "status"]).output().unwrap();
    assert_eq!(output.status.code(), Some(3), "Expected auth exit code");
    let text = combined_output(&output);
    assert!(
        text.contains("auth login"),
        "Expected login hint in output:\n{text}"
    );
}
