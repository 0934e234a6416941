//! CLI integration tests for mysql-pg-migrate.
//!
//! These tests verify argument parsing, help output and exit codes for
//! configuration errors. Nothing here needs a database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the mysql-pg-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("mysql-pg-migrate").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_config_argument() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("CONFIG"))
        .stdout(predicate::str::contains("JSON or XML"));
}

#[test]
fn test_help_shows_flags() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mysql-pg-migrate"));
}

#[test]
fn test_missing_config_argument_shows_usage() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_file_exits_with_io_code() {
    cmd()
        .arg("nonexistent_config_file.json")
        .assert()
        .code(7);
}

#[test]
fn test_invalid_json_exits_with_config_code() {
    let mut file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
    writeln!(file, "{{ not json").unwrap();

    cmd()
        .arg(file.path())
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_config_code() {
    let file = tempfile::NamedTempFile::with_suffix(".json").unwrap();

    cmd()
        .arg(file.path())
        .assert()
        .code(1);
}

#[test]
fn test_missing_required_fields_exits_with_config_code() {
    let mut file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
    writeln!(
        file,
        r#"{{"source": {{"host": "localhost", "database": "d", "user": "u", "password": "p"}}}}"#
    )
    .unwrap();

    cmd()
        .arg(file.path())
        .assert()
        .code(1);
}

#[test]
fn test_unsupported_extension_exits_with_config_code() {
    let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
    writeln!(file, "source: {{}}").unwrap();

    cmd()
        .arg(file.path())
        .assert()
        .code(1);
}

#[test]
fn test_unsupported_encoding_exits_with_config_code() {
    let mut file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
    writeln!(
        file,
        r#"{{
          "source": {{"host": "h", "database": "d", "user": "u", "password": "p"}},
          "target": {{"host": "h", "database": "d", "user": "u", "password": "p"}},
          "encoding": "latin1"
        }}"#
    )
    .unwrap();

    cmd()
        .arg(file.path())
        .assert()
        .code(1);
}
