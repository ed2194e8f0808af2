//! CLI smoke tests for vorpal-config.
//!
//! None of these reach the agent: every invocation fails or exits during
//! argument handling.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

fn config_cmd() -> Command {
  cargo_bin_cmd!("vorpal-config")
}

#[test]
fn help_flag_works() {
  config_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn start_help_lists_flags() {
  config_cmd()
    .args(["start", "--help"])
    .assert()
    .success()
    .stdout(predicate::str::contains("--agent"))
    .stdout(predicate::str::contains("--registry"))
    .stdout(predicate::str::contains("--variable"));
}

#[test]
fn start_requires_artifact() {
  config_cmd()
    .arg("start")
    .assert()
    .failure()
    .stderr(predicate::str::contains("--artifact"));
}

#[test]
fn invalid_system_is_rejected() {
  config_cmd()
    .args(["start", "--artifact", "hello", "--system", "sparc-solaris"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("sparc-solaris"));
}

#[test]
fn malformed_variable_is_rejected() {
  config_cmd()
    .args(["start", "--artifact", "hello", "--variable", "novalue"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("invalid variable"));
}

#[test]
fn unknown_artifact_is_rejected() {
  config_cmd()
    .args(["start", "--artifact", "nope"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Unknown artifact: nope"));
}
