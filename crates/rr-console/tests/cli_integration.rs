//! CLI integration tests
//!
//! Tests the remote-repl console binary using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;

fn remote_repl() -> Command {
    Command::cargo_bin("remote-repl")
        .expect("Failed to locate remote-repl binary - ensure it's built before running tests")
}

/// A port nothing is listening on
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn test_cli_help() {
    remote_repl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("remote-repl"))
        .stdout(predicate::str::contains("--server"))
        .stdout(predicate::str::contains("--persist"))
        .stdout(predicate::str::contains("--capture"));
}

#[test]
fn test_cli_version() {
    remote_repl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("remote-repl"));
}

#[test]
fn test_cli_rejects_bad_capture_value() {
    remote_repl()
        .args(["-f", "--capture", "sometimes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sometimes"));
}

#[test]
fn test_cli_unreachable_endpoint_fails_fast() {
    let port = closed_port().to_string();
    remote_repl()
        .args(["-f", "-s", "127.0.0.1", "-p", &port])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to attach"));
}

#[test]
fn test_cli_skip_startup_files_conflicts_with_config() {
    remote_repl()
        .args(["-f", "--config", "console.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
