//! Fast CLI checks on the demo binary.

#![allow(deprecated)] // assert_cmd::Command::cargo_bin is deprecated but works fine

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_recording_options() {
    Command::cargo_bin("labrec-demo")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Experiment recording"))
        .stdout(predicate::str::contains("--experiments-directory"))
        .stdout(predicate::str::contains("--experiment-id"))
        .stdout(predicate::str::contains("--description"));
}

#[test]
fn test_help_lists_training_options() {
    Command::cargo_bin("labrec-demo")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--epochs"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_unknown_flag_fails() {
    Command::cargo_bin("labrec-demo")
        .unwrap()
        .arg("--no-such-flag")
        .assert()
        .failure();
}
